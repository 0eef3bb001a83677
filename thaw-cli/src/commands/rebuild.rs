use std::time::Instant;

use failure::{Error, ResultExt};
use term_painter::{Color, ToStyle};
use thaw::{
    io::stl,
    Diagnostics, Options, Reconstructed, Reconstruction,
};

use crate::{
    args::{GlobalArgs, RebuildArgs},
    ui,
};


pub fn run(_global_args: &GlobalArgs, args: &RebuildArgs) -> Result<(), Error> {
    let start_time = Instant::now();

    let filename = &args.file;
    let input = progress!(["Reading '{}'", filename] => {
        stl::Reader::open(filename)
            .context(format!("failed to open file '{}'", filename))?
            .read(stl::ReadOptions::default())
            .context(format!("failed to read '{}'", filename))?
    });
    if let Some(format) = input.format {
        info!("Source format: STL ({} encoding)", format);
    }

    let options = Options {
        batch_size: args.batch_size,
        double_sided_test: !args.no_double_sided_test,
        repair_non_manifold: !args.no_repair,
    };

    let before_rebuild = Instant::now();
    let task = ui::Task::start("Reconstructing");
    let out = Reconstruction::new(&input.store, options)
        .run(&mut |done: u32, total: u32| task.update(done, total), &false)?;
    task.finish();
    let rebuild_time = before_rebuild.elapsed();

    println!();
    print_summary(&out, input.store.num_triangles() as usize);
    println!();
    print_diagnostics(&out.diagnostics, args.details);

    info!(
        "Processing time: {:.2?} ({:.2?} reconstructing)",
        start_time.elapsed(),
        rebuild_time,
    );

    Ok(())
}

fn print_summary(out: &Reconstructed, num_triangles: usize) {
    let rows = [
        ("triangles", num_triangles),
        ("polygons", out.polygons().count()),
        ("positions", out.num_positions()),
        ("UV entries", out.uvs.len()),
        ("edges", out.topology.num_merged_edges() as usize),
        ("border edges", out.num_border_edges()),
    ];

    for (label, count) in &rows {
        println!(
            "{:>14} {}",
            Color::BrightWhite.paint(label),
            Color::BrightWhite.bold().paint(ui::fmt_with_thousand_sep(*count as u64)),
        );
    }
}

fn print_diagnostics(diagnostics: &Diagnostics, details: bool) {
    if diagnostics.is_clean() {
        info!("No problems found");
        return;
    }

    if !diagnostics.malformed_polygons.is_empty() {
        warn!(
            "{} malformed polygons were kept unwelded",
            diagnostics.malformed_polygons.len(),
        );
        if details {
            for (p, reason) in &diagnostics.malformed_polygons {
                println!("    {:?}: {}", p, reason);
            }
        }
    }

    if !diagnostics.ambiguous_edges.is_empty() {
        warn!(
            "{} edges had more than one neighbor candidate",
            diagnostics.ambiguous_edges.len(),
        );
        if details {
            for ambiguous in &diagnostics.ambiguous_edges {
                println!(
                    "    {:?} of {:?}: candidates {:?}, kept {:?}",
                    ambiguous.edge,
                    ambiguous.polygon,
                    ambiguous.candidates,
                    ambiguous.kept,
                );
            }
        }
    }

    if diagnostics.rejected_double_sided > 0 {
        info!(
            "{} edge pairs were not glued because they belong to double-sided surfaces",
            diagnostics.rejected_double_sided,
        );
    }

    if diagnostics.non_manifold_repairs > 0 {
        info!("{} non-manifold vertices were split", diagnostics.non_manifold_repairs);
    }
}
