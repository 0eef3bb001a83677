//! The reconstruction pipeline: a resumable state machine running all steps
//! in bounded batches.
//!
//! The pipeline runs six stages over all polygons in input order, in batches
//! of [`Options::batch_size`] polygons:
//!
//! 1. `Boundary`: derive the boundary cycle of each polygon and register its
//!    edges in the global position index.
//! 2. `Candidates`: find the neighbor candidates of each boundary edge.
//! 3. `Adjacency`: choose one partner per edge.
//! 4. `Welding`: merge corners and edges.
//! 5. `Repair`: find non-manifold vertices.
//! 6. `Indexing`: assign position and UV indices.
//!
//! If `Repair` finds anything, the `Split` stage runs before `Indexing`. It
//! splits up to `batch_size` non-manifold vertices per batch. How many
//! batches it needs is only known while it runs, so the total number of
//! batches can grow once `Repair` has started.
//!
//! [`Reconstruction::step`] runs exactly one batch. Between two steps, the
//! caller can report progress, check for cancellation or do other work. The
//! input store is only borrowed immutably, so dropping an unfinished
//! `Reconstruction` leaves no trace.

use std::{
    cell::Cell,
    cmp::min,
    sync::atomic::{AtomicBool, Ordering},
};

use derive_more::Display;
use failure::Fail;
use log::{debug, info};

use crate::{
    adjacency::{Adjacency, AmbiguousEdge},
    boundary::{Boundaries, MalformedPolygon},
    handle::{Handle, PolygonHandle},
    index::{IndexAssigner, Reconstructed},
    repair::RepairPass,
    store::GeometryStore,
    weld::Topology,
};



/// Number of stages that process polygons. `Split` is not one of them.
const NUM_STAGES: u32 = 6;

/// Options for the reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Number of polygons (or non-manifold vertices while splitting)
    /// processed per step. Values below 1 are treated as 1. Default: 256.
    pub batch_size: usize,

    /// Whether to reject neighbor candidates whose polygons look like the two
    /// faces of one double-sided surface. Default: `true`.
    pub double_sided_test: bool,

    /// Whether to split non-manifold vertices after welding. Default: `true`.
    pub repair_non_manifold: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            batch_size: 256,
            double_sided_test: true,
            repair_non_manifold: true,
        }
    }
}

/// The stages of the reconstruction, in order.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    #[display(fmt = "building boundaries")]
    Boundary,
    #[display(fmt = "collecting neighbor candidates")]
    Candidates,
    #[display(fmt = "resolving adjacency")]
    Adjacency,
    #[display(fmt = "welding")]
    Welding,
    #[display(fmt = "finding non-manifold vertices")]
    Repair,
    #[display(fmt = "splitting non-manifold vertices")]
    Split,
    #[display(fmt = "assigning indices")]
    Indexing,
    #[display(fmt = "done")]
    Done,
}

impl Stage {
    fn next(self) -> Self {
        match self {
            Stage::Boundary => Stage::Candidates,
            Stage::Candidates => Stage::Adjacency,
            Stage::Adjacency => Stage::Welding,
            Stage::Welding => Stage::Repair,
            Stage::Repair => Stage::Split,
            Stage::Split => Stage::Indexing,
            Stage::Indexing | Stage::Done => Stage::Done,
        }
    }
}

/// Progress after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// The stage of the batch that was just run.
    pub stage: Stage,
    pub batches_done: u32,
    pub batches_total: u32,
}

/// Non-fatal findings of a reconstruction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    /// Polygons whose triangles do not form one closed boundary. They are
    /// kept but not welded to anything.
    pub malformed_polygons: Vec<(PolygonHandle, MalformedPolygon)>,

    /// Edges with more than one neighbor candidate.
    pub ambiguous_edges: Vec<AmbiguousEdge>,

    /// Candidate pairs rejected by the double-sided test.
    pub rejected_double_sided: u32,

    /// Number of merged vertices split by the non-manifold repair.
    pub non_manifold_repairs: u32,
}

impl Diagnostics {
    /// Returns `true` if nothing noteworthy happened.
    pub fn is_clean(&self) -> bool {
        self.malformed_polygons.is_empty()
            && self.ambiguous_edges.is_empty()
            && self.rejected_double_sided == 0
            && self.non_manifold_repairs == 0
    }
}

/// Errors of [`Reconstruction::run`] and [`Reconstruction::finish`].
#[derive(Debug, Fail, PartialEq, Eq)]
pub enum Error {
    #[fail(display = "reconstruction cancelled after {} of {} batches", batches_done, batches_total)]
    Cancelled {
        batches_done: u32,
        batches_total: u32,
    },

    #[fail(display = "reconstruction not finished yet ({} of {} batches done)", batches_done, batches_total)]
    NotFinished {
        batches_done: u32,
        batches_total: u32,
    },
}

/// Receives progress reports from [`Reconstruction::run`].
pub trait ProgressSink {
    fn report(&mut self, batches_done: u32, batches_total: u32);
}

impl<F: FnMut(u32, u32)> ProgressSink for F {
    fn report(&mut self, batches_done: u32, batches_total: u32) {
        self(batches_done, batches_total)
    }
}

/// A progress sink discarding all reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _: u32, _: u32) {}
}

/// Something that can request cancellation, checked between two batches.
pub trait CancelFlag {
    fn is_cancelled(&self) -> bool;
}

impl CancelFlag for bool {
    fn is_cancelled(&self) -> bool {
        *self
    }
}

impl CancelFlag for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl CancelFlag for Cell<bool> {
    fn is_cancelled(&self) -> bool {
        self.get()
    }
}

impl<T: CancelFlag + ?Sized> CancelFlag for &T {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

/// A resumable reconstruction of the connectivity of one geometry store.
#[derive(Debug)]
pub struct Reconstruction<'a> {
    store: &'a GeometryStore,
    options: Options,

    stage: Stage,
    /// Index of the next polygon to process in the current stage.
    cursor: usize,
    batches_done: u32,
    batches_per_stage: u32,
    split_batches_done: u32,

    boundaries: Boundaries,
    adjacency: Adjacency,
    topology: Topology,
    repair: RepairPass,
    indexer: IndexAssigner,
    diagnostics: Diagnostics,
}

impl<'a> Reconstruction<'a> {
    pub fn new(store: &'a GeometryStore, options: Options) -> Self {
        let batch_size = options.batch_size.max(1);
        let num_polygons = store.num_polygons() as usize;
        let batches_per_stage = ((num_polygons + batch_size - 1) / batch_size) as u32;

        let stage = if num_polygons == 0 { Stage::Done } else { Stage::Boundary };
        debug!(
            "reconstructing {} polygons ({} triangles) in batches of {}",
            num_polygons,
            store.num_triangles(),
            batch_size,
        );

        Self {
            store,
            options: Options { batch_size, ..options },
            stage,
            cursor: 0,
            batches_done: 0,
            batches_per_stage,
            split_batches_done: 0,
            boundaries: Boundaries::new(),
            adjacency: Adjacency::new(options.double_sided_test),
            topology: Topology::default(),
            repair: RepairPass::new(),
            indexer: IndexAssigner::default(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The stage the next step will work on.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }

    /// The number of batches of the whole reconstruction, as far as it is
    /// known yet. Only the `Split` stage can make it grow.
    pub fn batches_total(&self) -> u32 {
        let batch_size = self.options.batch_size;
        let split_pending = (self.repair.pending() + batch_size - 1) / batch_size;
        self.batches_per_stage * NUM_STAGES + self.split_batches_done + split_pending as u32
    }

    pub fn progress(&self) -> Progress {
        Progress {
            stage: self.stage,
            batches_done: self.batches_done,
            batches_total: self.batches_total(),
        }
    }

    /// Runs one batch of the current stage. Returns `None` without doing
    /// anything if the reconstruction is already finished.
    pub fn step(&mut self) -> Option<Progress> {
        if self.is_finished() {
            return None;
        }

        let stage = self.stage;
        let stage_done = if stage == Stage::Split {
            self.repair.split_batch(
                self.store,
                &self.boundaries,
                &self.adjacency,
                &mut self.topology,
                self.options.batch_size,
            );
            self.split_batches_done += 1;
            self.repair.is_done()
        } else {
            if self.cursor == 0 {
                self.enter_stage();
            }

            let num_polygons = self.store.num_polygons() as usize;
            let end = min(self.cursor + self.options.batch_size, num_polygons);
            for i in self.cursor..end {
                self.process(PolygonHandle::from_usize(i));
            }
            self.cursor = end;
            self.cursor == num_polygons
        };
        self.batches_done += 1;

        if stage_done {
            self.leave_stage();
            self.stage = stage.next();
            self.cursor = 0;
            if self.stage == Stage::Split && self.repair.is_done() {
                self.stage = Stage::Indexing;
            }
        }

        Some(Progress {
            stage,
            batches_done: self.batches_done,
            batches_total: self.batches_total(),
        })
    }

    fn enter_stage(&mut self) {
        debug!("{}...", self.stage);
        let store = self.store;
        match self.stage {
            Stage::Candidates => self.adjacency.prepare(&self.boundaries),
            Stage::Welding => self.topology = Topology::new(store, &self.boundaries),
            Stage::Indexing => self.indexer = IndexAssigner::new(store),
            _ => {}
        }
    }

    fn process(&mut self, p: PolygonHandle) {
        let store = self.store;
        match self.stage {
            Stage::Boundary => {
                if let Err(e) = self.boundaries.add_polygon(store, p) {
                    self.diagnostics.malformed_polygons.push((p, e));
                }
                self.adjacency.register_polygon(&self.boundaries, p);
            }
            Stage::Candidates => self.adjacency.collect_candidates(&self.boundaries, p),
            Stage::Adjacency => self.adjacency.resolve_polygon(&self.boundaries, p),
            Stage::Welding => {
                self.topology.weld_polygon(store, &self.boundaries, &self.adjacency, p);
            }
            Stage::Repair => {
                if self.options.repair_non_manifold {
                    self.repair.scan_polygon(store, &self.boundaries, &self.topology, p);
                }
            }
            Stage::Indexing => {
                self.indexer.assign_polygon(store, &self.boundaries, &self.topology, p);
            }
            Stage::Split | Stage::Done => {}
        }
    }

    fn leave_stage(&mut self) {
        match self.stage {
            Stage::Boundary => {
                debug!(
                    "{} boundary edges, {} malformed polygons",
                    self.boundaries.num_edges(),
                    self.diagnostics.malformed_polygons.len(),
                );
            }
            Stage::Adjacency => {
                self.diagnostics.ambiguous_edges = self.adjacency.take_ambiguous_edges();
                self.diagnostics.rejected_double_sided = self.adjacency.rejected_double_sided();
            }
            Stage::Welding => {
                debug!(
                    "welded into {} vertices and {} edges",
                    self.topology.num_merged_vertices(),
                    self.topology.num_merged_edges(),
                );
            }
            Stage::Repair => {
                debug!("{} non-manifold vertices", self.repair.num_offending());
            }
            Stage::Split => {
                self.diagnostics.non_manifold_repairs = self.repair.repairs();
            }
            Stage::Indexing => {
                let d = &self.diagnostics;
                info!(
                    "reconstructed {} polygons: {} malformed, {} ambiguous edges, \
                        {} double-sided rejections, {} non-manifold repairs",
                    self.store.num_polygons(),
                    d.malformed_polygons.len(),
                    d.ambiguous_edges.len(),
                    d.rejected_double_sided,
                    d.non_manifold_repairs,
                );
            }
            Stage::Candidates | Stage::Done => {}
        }
    }

    /// Runs all remaining batches, reporting progress to `sink` after each
    /// one and checking `cancel` before each one.
    ///
    /// On cancellation, all intermediate state is dropped and the store is
    /// untouched.
    pub fn run(
        mut self,
        sink: &mut impl ProgressSink,
        cancel: &impl CancelFlag,
    ) -> Result<Reconstructed, Error> {
        while !self.is_finished() {
            if cancel.is_cancelled() {
                debug!("cancelled after {} batches", self.batches_done);
                return Err(Error::Cancelled {
                    batches_done: self.batches_done,
                    batches_total: self.batches_total(),
                });
            }

            if let Some(progress) = self.step() {
                sink.report(progress.batches_done, progress.batches_total);
            }
        }

        self.finish()
    }

    /// Returns the result of a finished reconstruction.
    pub fn finish(self) -> Result<Reconstructed, Error> {
        if !self.is_finished() {
            return Err(Error::NotFinished {
                batches_done: self.batches_done,
                batches_total: self.batches_total(),
            });
        }

        Ok(self.into_output())
    }

    fn into_output(self) -> Reconstructed {
        self.indexer.finish(self.diagnostics, self.boundaries, self.topology)
    }
}

/// Runs a whole reconstruction without progress reports or cancellation.
pub fn reconstruct(store: &GeometryStore, options: Options) -> Reconstructed {
    let mut reconstruction = Reconstruction::new(store, options);
    while reconstruction.step().is_some() {}
    reconstruction.into_output()
}
