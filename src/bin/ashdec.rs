use clap::{arg,crate_version,Command};
use ash0::{ash,Options};

const RCH: &str = "unreachable was reached";

fn main() -> Result<(),Box<dyn std::error::Error>>
{
    env_logger::init();
    let long_help =
"Examples:
---------
Expand:                `ashdec my_archive.ash -o my_archive`
My Pokemon Ranch:      `ashdec my_archive.ash -d 15`";

    let matches = Command::new("ashdec")
        .about("Expand a file from Nintendo's ASH0 format")
        .after_long_help(long_help)
        .version(crate_version!())
        .arg(arg!(<infile> "input path"))
        .arg(arg!(-o --output <PATH> "output path, defaults to <infile>.arc").required(false))
        .arg(arg!(-d --dist [BITS] "distance tree bits")
            .value_parser(clap::value_parser!(u32)).default_value("11"))
        .arg(arg!(-l --length [BITS] "length tree bits")
            .value_parser(clap::value_parser!(u32)).default_value("9"))
        .get_matches();

    let inpath = matches.get_one::<String>("infile").expect(RCH);
    let opt = Options {
        sym_bits: *matches.get_one::<u32>("length").expect(RCH),
        dist_bits: *matches.get_one::<u32>("dist").expect(RCH),
        passes: 0
    };
    let dat = std::fs::read(inpath)?;
    let expanded = ash::expand(&dat,&opt)?;
    let outpath = match matches.get_one::<String>("output") {
        Some(path) => path.clone(),
        None => format!("{}.arc",inpath)
    };
    std::fs::write(&outpath,expanded)?;
    Ok(())
}
