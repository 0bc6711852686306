#[macro_use]
extern crate anyhow;

use byte_unit::Byte;
use clap::{arg, Arg, ArgMatches, Command};
use inodefs::{mkfs, BitmapAllocator, BlockAllocator, FileSystem, FsError, BLOCK_SIZE};
use std::{convert::TryFrom, io};

fn main() -> anyhow::Result<()> {
    let matches = Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .subcommand_required(true)
        .arg(
            Arg::new("disk-size")
                .long("disk-size")
                .takes_value(true)
                .global(true)
                .default_value("16MiB")
                .help("Size of the simulated block device in bytes; divided into 4096 byte blocks."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .help("Log every tree mutation."),
        )
        .subcommand(
            Command::new("mkfs")
                .about("Create a master file table holding only the root directory")
                .arg(arg!(<table> "Location of the new master file table")),
        )
        .subcommand(
            Command::new("mkdir")
                .about("Create a directory")
                .arg(arg!(<table> "Master file table"))
                .arg(arg!(<path> "Absolute path of the new directory")),
        )
        .subcommand(
            Command::new("create")
                .about("Create a file and allocate its blocks")
                .arg(arg!(<table> "Master file table"))
                .arg(arg!(<path> "Absolute path of the new file"))
                .arg(arg!(<size> "File size, e.g. 100, 10KiB or 2MB")),
        )
        .subcommand(
            Command::new("rm")
                .about("Delete a file and free its blocks")
                .arg(arg!(<table> "Master file table"))
                .arg(arg!(<path> "Absolute path of the file")),
        )
        .subcommand(
            Command::new("rmdir")
                .about("Delete an empty directory")
                .arg(arg!(<table> "Master file table"))
                .arg(arg!(<path> "Absolute path of the directory")),
        )
        .subcommand(
            Command::new("tree")
                .about("Print every inode of the table")
                .arg(arg!(<table> "Master file table")),
        )
        .subcommand(
            Command::new("df")
                .about("Show block usage")
                .arg(arg!(<table> "Master file table")),
        )
        .get_matches();

    let (name, sub) = match matches.subcommand() {
        Some(subcommand) => subcommand,
        None => bail!("no subcommand given"),
    };

    let level = if sub.is_present("verbose") || matches.is_present("verbose") {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let table = sub.value_of("table").unwrap();
    let disk_size = parse_size(
        sub.value_of("disk-size")
            .or_else(|| matches.value_of("disk-size"))
            .unwrap_or("16MiB"),
    )?;

    match name {
        "mkfs" => mkfs::make(table)?,
        "mkdir" => with_table(table, disk_size, |fs| {
            let (parent, leaf) = fs.lookup_parent(path(sub))?;
            fs.create_dir(Some(parent), leaf)?;
            Ok(())
        })?,
        "create" => {
            let size = u32::try_from(parse_size(sub.value_of("size").unwrap())?)
                .map_err(|_| anyhow!("file size does not fit in 32 bits"))?;
            with_table(table, disk_size, |fs| {
                let (parent, leaf) = fs.lookup_parent(path(sub))?;
                fs.create_file(parent, leaf, size)?;
                Ok(())
            })?
        }
        "rm" => with_table(table, disk_size, |fs| {
            let (parent, leaf) = fs.lookup_parent(path(sub))?;
            let node = fs
                .find_inode_by_name(parent, leaf)
                .ok_or(FsError::NotFound)?;
            fs.delete_file(parent, node)?;
            Ok(())
        })?,
        "rmdir" => with_table(table, disk_size, |fs| {
            if Some(fs.lookup(path(sub))?) == fs.root() {
                bail!("refusing to remove the root directory");
            }
            let (parent, leaf) = fs.lookup_parent(path(sub))?;
            let node = fs
                .find_inode_by_name(parent, leaf)
                .ok_or(FsError::NotFound)?;
            fs.delete_dir(Some(parent), node)?;
            Ok(())
        })?,
        "tree" => {
            let fs = FileSystem::load(table, BitmapAllocator::with_disk_size(disk_size))?;
            fs.debug_fs(&mut io::stdout().lock())?;
        }
        "df" => {
            let fs = FileSystem::load(table, BitmapAllocator::with_disk_size(disk_size))?;
            let alloc = fs.allocator();
            println!(
                "{} inodes, {} blocks used ({}), {} blocks free ({})",
                fs.len(),
                alloc.used_blocks(),
                human(alloc.used_blocks()),
                alloc.free_blocks(),
                human(alloc.free_blocks()),
            );
        }
        other => bail!("unknown subcommand {}", other),
    }

    Ok(())
}

fn with_table<F>(table: &str, disk_size: u64, op: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut FileSystem) -> anyhow::Result<()>,
{
    let mut fs = FileSystem::load(table, BitmapAllocator::with_disk_size(disk_size))?;
    op(&mut fs)?;
    fs.save(table)?;
    Ok(())
}

fn path(matches: &ArgMatches) -> &str {
    matches.value_of("path").unwrap_or("/")
}

fn parse_size(value: &str) -> anyhow::Result<u64> {
    let bytes = match Byte::from_str(value) {
        Ok(size) => size.get_bytes(),
        Err(err) => return Err(anyhow!(err)),
    };

    u64::try_from(bytes).map_err(|_| anyhow!("size {} is too large", value))
}

fn human(blocks: u64) -> String {
    Byte::from_bytes((blocks * BLOCK_SIZE as u64).into())
        .get_appropriate_unit(true)
        .to_string()
}
