//! Break reminder alert. The rodio backend lives behind the `audio` feature;
//! without it the alert is silent and reminders are visual only.

pub mod chime;

#[cfg(feature = "audio")]
pub use engine::ChimeAlert;

use std::sync::Arc;

use crate::notify::AlertPlayer;

/// Picks the alert backend for this build.
pub fn default_alert() -> Arc<dyn AlertPlayer> {
    #[cfg(feature = "audio")]
    {
        Arc::new(ChimeAlert::new())
    }
    #[cfg(not(feature = "audio"))]
    {
        Arc::new(crate::notify::SilentAlert)
    }
}

#[cfg(feature = "audio")]
mod engine {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
        Arc, Mutex,
    };
    use std::thread;

    use anyhow::{anyhow, Context, Result};
    use rodio::{OutputStream, Sink};

    use super::chime::Chime;
    use crate::notify::AlertPlayer;

    const ENABLE_LOGS: bool = true;

    use crate::log_warn;

    enum AlertCommand {
        Play,
        Stop,
    }

    /// Plays the chime on a dedicated thread that owns the non-`Send` rodio
    /// output stream.
    pub struct ChimeAlert {
        tx: Mutex<Option<Sender<AlertCommand>>>,
        playing: Arc<AtomicBool>,
    }

    impl ChimeAlert {
        pub fn new() -> Self {
            Self {
                tx: Mutex::new(None),
                playing: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn is_playing(&self) -> bool {
            self.playing.load(Ordering::SeqCst)
        }

        fn ensure_thread(&self) -> Result<Sender<AlertCommand>> {
            let mut guard = self
                .tx
                .lock()
                .map_err(|_| anyhow!("alert sender lock poisoned"))?;
            if let Some(tx) = guard.as_ref() {
                return Ok(tx.clone());
            }

            let (tx, rx) = mpsc::channel::<AlertCommand>();
            let playing = Arc::clone(&self.playing);

            thread::Builder::new()
                .name("punchcard-alert".to_string())
                .spawn(move || {
                    let mut stream: Option<OutputStream> = None;
                    let mut sink: Option<Sink> = None;

                    while let Ok(cmd) = rx.recv() {
                        match cmd {
                            AlertCommand::Play => {
                                if let Some(old) = sink.take() {
                                    old.stop();
                                }
                                match OutputStream::try_default() {
                                    Ok((new_stream, handle)) => match Sink::try_new(&handle) {
                                        Ok(new_sink) => {
                                            new_sink.append(Chime::new());
                                            stream = Some(new_stream);
                                            sink = Some(new_sink);
                                            playing.store(true, Ordering::SeqCst);
                                        }
                                        Err(err) => log_warn!("Failed to create audio sink: {err}"),
                                    },
                                    Err(err) => {
                                        log_warn!("Failed to create audio output stream: {err}")
                                    }
                                }
                            }
                            AlertCommand::Stop => {
                                if let Some(old) = sink.take() {
                                    old.stop();
                                }
                                stream = None;
                                playing.store(false, Ordering::SeqCst);
                            }
                        }
                    }
                    drop(stream);
                })
                .context("failed to spawn alert thread")?;

            *guard = Some(tx.clone());
            Ok(tx)
        }
    }

    impl Default for ChimeAlert {
        fn default() -> Self {
            Self::new()
        }
    }

    impl AlertPlayer for ChimeAlert {
        fn play(&self) -> Result<()> {
            let tx = self.ensure_thread()?;
            tx.send(AlertCommand::Play)
                .map_err(|err| anyhow!("alert thread gone: {err}"))
        }

        fn stop(&self) -> Result<()> {
            // Never start the thread just to stop it.
            if let Ok(Some(tx)) = self.tx.lock().map(|guard| guard.clone()) {
                let _ = tx.send(AlertCommand::Stop);
            }
            Ok(())
        }
    }
}
