fn main() {
    if let Err(err) = sheetload::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
