use clap::{App, Arg, SubCommand};
use memshuttle::{size_for, RegionProvisioner, Result, ShuttleError, HEADER_SIZE};
use std::fs;

fn main() -> Result<()> {
    env_logger::init();

    let matches = App::new("memshuttle-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Memshuttle Shared Region CLI Tool")
        .subcommand(
            SubCommand::with_name("region")
                .about("Inspect and manipulate path-backed shared regions")
                .subcommand(
                    SubCommand::with_name("create")
                        .about("Create a new region at a path")
                        .arg(
                            Arg::with_name("path")
                                .short("p")
                                .long("path")
                                .value_name("PATH")
                                .help("Backing store path")
                                .required(true)
                                .takes_value(true),
                        )
                        .arg(
                            Arg::with_name("capacity")
                                .short("c")
                                .long("capacity")
                                .value_name("BYTES")
                                .help("Maximum value size in bytes")
                                .required(true)
                                .takes_value(true),
                        ),
                )
                .subcommand(
                    SubCommand::with_name("write")
                        .about("Write a value into an existing region")
                        .arg(
                            Arg::with_name("path")
                                .short("p")
                                .long("path")
                                .value_name("PATH")
                                .help("Backing store path")
                                .required(true)
                                .takes_value(true),
                        )
                        .arg(
                            Arg::with_name("data")
                                .short("d")
                                .long("data")
                                .value_name("DATA")
                                .help("Value to store (UTF-8)")
                                .required(true)
                                .takes_value(true),
                        ),
                )
                .subcommand(
                    SubCommand::with_name("read")
                        .about("Read the value from an existing region")
                        .arg(
                            Arg::with_name("path")
                                .short("p")
                                .long("path")
                                .value_name("PATH")
                                .help("Backing store path")
                                .required(true)
                                .takes_value(true),
                        ),
                )
                .subcommand(
                    SubCommand::with_name("info")
                        .about("Show region layout and current length")
                        .arg(
                            Arg::with_name("path")
                                .short("p")
                                .long("path")
                                .value_name("PATH")
                                .help("Backing store path")
                                .required(true)
                                .takes_value(true),
                        ),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        ("region", Some(region_matches)) => handle_region_commands(region_matches),
        _ => {
            eprintln!("No command specified. Use --help for usage information.");
            Ok(())
        }
    }
}

fn handle_region_commands(matches: &clap::ArgMatches) -> Result<()> {
    let provisioner = RegionProvisioner::new();

    match matches.subcommand() {
        ("create", Some(create_matches)) => {
            let path = create_matches.value_of("path").unwrap();
            let capacity: usize = create_matches
                .value_of("capacity")
                .unwrap()
                .parse()
                .map_err(|_| {
                    ShuttleError::invalid_parameter("capacity", "must be a non-negative integer")
                })?;

            // The CLI creates persistent stores: the region object is
            // transient, the file outlives this process.
            let region = provisioner.create_at(path, capacity, false)?;
            println!(
                "Created region at {} (capacity {} bytes, total {} bytes)",
                path,
                capacity,
                region.total_size()
            );
            Ok(())
        }
        ("write", Some(write_matches)) => {
            let path = write_matches.value_of("path").unwrap();
            let data = write_matches.value_of("data").unwrap();

            let mut region = attach(&provisioner, path)?;
            region.set_value(data.as_bytes())?;
            region.flush()?;
            println!("Wrote {} bytes to {}", data.len(), path);
            Ok(())
        }
        ("read", Some(read_matches)) => {
            let path = read_matches.value_of("path").unwrap();

            let region = attach(&provisioner, path)?;
            let value = region.value();
            println!("Length: {} bytes", value.len());
            println!("Value: {}", String::from_utf8_lossy(value));
            Ok(())
        }
        ("info", Some(info_matches)) => {
            let path = info_matches.value_of("path").unwrap();

            let region = attach(&provisioner, path)?;
            println!("Path:      {}", path);
            println!("Total:     {} bytes", region.total_size());
            println!("Header:    {} bytes", HEADER_SIZE);
            println!("Capacity:  {} bytes", region.capacity());
            println!("Length:    {} bytes", region.header().length());
            Ok(())
        }
        _ => {
            eprintln!("No region command specified. Use --help for usage information.");
            Ok(())
        }
    }
}

/// Attach to a path-backed region, deriving the total size from the store
fn attach(
    provisioner: &RegionProvisioner,
    path: &str,
) -> Result<memshuttle::SharedRegion> {
    let store_len = fs::metadata(path)
        .map_err(|e| ShuttleError::from_io(e, "failed to stat backing store"))?
        .len() as usize;
    if store_len < size_for(0) {
        return Err(ShuttleError::provision(format!(
            "{} is too small to hold a region header",
            path
        )));
    }
    provisioner.attach_path(path, store_len, false)
}
