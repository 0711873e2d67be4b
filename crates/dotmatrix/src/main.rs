fn main() {
    env_logger::init();

    let rom_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: dotmatrix <rom.gb>");
            std::process::exit(2);
        }
    };

    log::info!("loading ROM: {}", rom_path);
    if let Err(err) = dotmatrix::run(&rom_path) {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}
