fn main() {
    if let Err(err) = commission_recon::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
