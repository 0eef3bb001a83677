use failure::{Error, ResultExt};
use term_painter::{Color, ToStyle};
use thaw::io::stl;

use crate::{
    args::{GlobalArgs, InfoArgs},
    ui,
};


pub fn run(_global_args: &GlobalArgs, args: &InfoArgs) -> Result<(), Error> {
    let filename = &args.file;
    let reader = stl::Reader::open(filename)
        .context(format!("failed to open file '{}'", filename))?;

    // Only counting, the triangles themselves are dropped right away.
    let mut sink = stl::CounterSink::new();
    progress!(["Reading '{}'", filename] => {
        reader.read_raw_into(&mut sink)
            .context(format!("failed to read '{}'", filename))?;
    });

    let format = sink.format.map(|f| f.to_string()).unwrap_or_else(|| "unknown".into());
    println!("File format: STL ({} encoding)", Color::BrightWhite.bold().paint(format));
    match &sink.solid_name {
        Some(name) if !name.is_empty() => {
            println!("Solid name:  {}", Color::BrightWhite.paint(name));
        }
        _ => println!("Solid name:  {}", Color::BrightBlack.paint("none")),
    }
    println!(
        "Triangles:   {}",
        Color::BrightWhite.bold().paint(ui::fmt_with_thousand_sep(sink.triangle_count.into())),
    );

    Ok(())
}
