use std::path::PathBuf;

use retrones::Command;

const USAGE: &str = "Usage:\n  \
    retrones info <rom.nes>\n  \
    retrones sav2state <in.sav> <out.json>\n  \
    retrones state2sav <in.json> <out.sav>";

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_default();
    let mut path = || args.next().map(PathBuf::from);

    let command = match (command.as_str(), path(), path()) {
        ("info", Some(rom), None) => Command::Info { rom },
        ("sav2state", Some(sav), Some(state)) => Command::SavToState { sav, state },
        ("state2sav", Some(state), Some(sav)) => Command::StateToSav { state, sav },
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    if let Err(err) = retrones::run(command) {
        log::error!("{err:#}");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
