fn main() {
    if let Err(err) = vizmap::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
