/// Dumps kernel virtual memory out of a kernel core image.
use clap::*;
use log::{info, Level};

use memflow_kcore::error::{Error, ErrorKind, ErrorOrigin, PartialError, Result};
use memflow_kcore::mem::{PhysicalMemory, VirtualMemory};
use memflow_kcore::{Address, ImageArgs, Session};

fn main() -> Result<()> {
    let matches = parse_args();
    let (path, args, addr, len, phys) = extract_args(&matches)?;

    let mut session = Session::open_args(path, args)?;
    info!(
        "opened {} ({:?}) base={:?}",
        path,
        session.liveness()?,
        session.translation_base()?
    );

    let data = if phys {
        session.phys_read_raw(addr, len)?
    } else {
        if let Ok(tr) = session.translate(addr) {
            println!("{:x} -> {:x} (run {:x})", addr, tr.pa, tr.run);
        }

        match session.virt_read_raw(addr, len) {
            Ok(data) => data,
            Err(PartialError::PartialVirtualRead { data, error }) => {
                println!("partial read, stopped after {:x} bytes: {}", data.len(), error);
                data
            }
            Err(err) => return Err(err.into()),
        }
    };

    hexdump(addr, &data);

    session.close();
    Ok(())
}

fn hexdump(base: Address, data: &[u8]) {
    for (i, line) in data.chunks(16).enumerate() {
        let bytes = line
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");
        let ascii = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect::<String>();
        println!("{:x}: {:<47} |{}|", base + i * 16, bytes, ascii);
    }
}

fn parse_args() -> ArgMatches {
    Command::new("read_kcore example")
        .version(crate_version!())
        .author(crate_authors!())
        .arg(Arg::new("verbose").short('v').action(ArgAction::Count))
        .arg(Arg::new("image").action(ArgAction::Set).required(true))
        .arg(
            Arg::new("args")
                .long("args")
                .short('a')
                .action(ArgAction::Set)
                .default_value("i386"),
        )
        .arg(
            Arg::new("address")
                .long("address")
                .short('x')
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new("length")
                .long("length")
                .short('l')
                .action(ArgAction::Set)
                .default_value("0x100"),
        )
        .arg(
            Arg::new("phys")
                .long("phys")
                .short('p')
                .action(ArgAction::SetTrue),
        )
        .get_matches()
}

fn extract_args(matches: &ArgMatches) -> Result<(&str, ImageArgs, Address, usize, bool)> {
    let log_level = match matches.get_count("verbose") {
        0 => Level::Error,
        1 => Level::Warn,
        2 => Level::Info,
        3 => Level::Debug,
        4 => Level::Trace,
        _ => Level::Trace,
    };
    simplelog::TermLogger::init(
        log_level.to_level_filter(),
        simplelog::Config::default(),
        simplelog::TerminalMode::Stdout,
        simplelog::ColorChoice::Auto,
    )
    .unwrap();

    let path = matches
        .get_one::<String>("image")
        .map(String::as_str)
        .unwrap();
    let args = ImageArgs::try_parse_str(matches.get_one::<String>("args").unwrap())?;
    let addr = parse_num(matches.get_one::<String>("address").unwrap())?;
    let len = parse_num(matches.get_one::<String>("length").unwrap())? as usize;

    Ok((path, args, Address::from(addr), len, matches.get_flag("phys")))
}

fn parse_num(s: &str) -> Result<u64> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|_| {
        Error(ErrorOrigin::Args, ErrorKind::ArgValidation)
            .log_error(format_args!("invalid number: {}", s))
    })
}
