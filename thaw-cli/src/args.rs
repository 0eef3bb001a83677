//! Defines `Args` which is used to parse command line arguments.

use structopt::StructOpt;


#[derive(StructOpt, Debug)]
#[structopt(raw(setting = "structopt::clap::AppSettings::VersionlessSubcommands"))]
pub struct Args {
    #[structopt(flatten)]
    pub global: GlobalArgs,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(StructOpt, Debug)]
pub struct GlobalArgs {
    /// Print more about what is going on. Can be repeated: `-v` shows
    /// informational messages, `-vv` debug messages of the reconstruction
    /// and `-vvv` everything.
    #[structopt(
        short = "-v",
        long = "--verbose",
        parse(from_occurrences),
    )]
    pub verbose: u8,
}

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Print information about an STL file.
    #[structopt(name = "info")]
    Info {
        #[structopt(flatten)]
        args: InfoArgs,
    },

    /// Rebuilds vertex and edge connectivity of the triangles in an STL file
    /// and prints a summary of the reconstructed mesh.
    #[structopt(name = "rebuild")]
    Rebuild {
        #[structopt(flatten)]
        args: RebuildArgs,
    },
}

#[derive(StructOpt, Debug)]
pub struct InfoArgs {
    /// Path to the STL file.
    pub file: String,
}

#[derive(StructOpt, Debug)]
pub struct RebuildArgs {
    /// Path to the STL file.
    pub file: String,

    /// Number of polygons processed per batch.
    #[structopt(
        short = "-b",
        long = "--batch-size",
        default_value = "256",
    )]
    pub batch_size: usize,

    /// If set, polygons lying on top of each other with opposite winding are
    /// glued together instead of being treated as the two faces of a
    /// double-sided surface.
    #[structopt(
        long = "--no-double-sided-test",
    )]
    pub no_double_sided_test: bool,

    /// If set, non-manifold vertices created by welding are not split up.
    #[structopt(
        long = "--no-repair",
    )]
    pub no_repair: bool,

    /// If set, every malformed polygon and every ambiguous edge is listed.
    #[structopt(
        short = "-d",
        long = "--details",
    )]
    pub details: bool,
}
