fn main() {
    if let Err(err) = punchcard_lib::run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
