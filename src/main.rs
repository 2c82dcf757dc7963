fn main() {
    if let Err(err) = label_placer::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
