fn main() {
    if let Err(err) = csv_inquire::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
