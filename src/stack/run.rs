//! Streaming stack integration.

use super::assemble::OutputContainer;
use super::coordinates::{CoordinateIndex, CoordinateTuple};
use crate::data::Frame;
use crate::integrate::{integrate, FrameIntegrationError, HandleResolver, ResolveError};
use std::sync::atomic::{AtomicBool, Ordering};

/// One frame excluded from the output, with the reason.
#[derive(Debug, Clone)]
pub struct SkippedFrame {
    /// Position of the frame in the input stream.
    pub index: usize,
    /// Coordinate the frame would have occupied.
    pub coordinate: CoordinateTuple,
    /// Why integration failed.
    pub error: FrameIntegrationError,
}

/// Completion report for a stack integration.
#[derive(Debug, Clone, Default)]
pub struct StackReport {
    /// Frames successfully integrated and assembled.
    pub integrated: usize,
    /// Frames excluded from the output.
    pub skipped: Vec<SkippedFrame>,
    /// True when the run was cancelled before consuming every frame.
    pub cancelled: bool,
}

/// Assembled container plus its completion report.
#[derive(Debug)]
pub struct StackOutput {
    pub container: OutputContainer,
    pub report: StackReport,
}

/// Two frames mapped to one coordinate tuple.
///
/// The output cannot represent two results at one coordinate, so the run
/// aborts. Entries assembled before the collision remain in `partial` and
/// stay usable; the ambiguous tuple itself is left empty, since neither of
/// the two frames can be preferred.
#[derive(Debug)]
pub struct StackAssemblyError {
    /// The contested coordinate tuple.
    pub duplicate: CoordinateTuple,
    /// Stream index of the second frame at that tuple.
    pub frame: usize,
    /// Everything assembled before the abort.
    pub partial: StackOutput,
}

impl std::fmt::Display for StackAssemblyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frame {} duplicates coordinate {} ({} prior entries kept)",
            self.frame,
            self.duplicate,
            self.partial.container.len()
        )
    }
}

impl std::error::Error for StackAssemblyError {}

/// Fatal stack integration errors.
#[derive(Debug)]
pub enum StackError {
    /// Duplicate coordinate tuple (carries the partial output).
    Assembly(StackAssemblyError),
    /// A frame's handle could not be resolved, or required metadata was
    /// missing. Surfaced immediately, per the construction-error policy.
    Resolve { frame: usize, source: ResolveError },
}

impl std::fmt::Display for StackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackError::Assembly(e) => write!(f, "{}", e),
            StackError::Resolve { frame, source } => {
                write!(f, "Frame {}: {}", frame, source)
            }
        }
    }
}

impl std::error::Error for StackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StackError::Assembly(e) => Some(e),
            StackError::Resolve { source, .. } => Some(source),
        }
    }
}

/// Stream a stack of frames into a coordinate-labeled output container.
///
/// Frames are consumed one at a time: each frame's pixel grid is dropped
/// as soon as its result is stored, so peak memory holds one raw frame,
/// one handle per distinct energy bucket, and the accumulating output.
/// Frames need not be ordered by energy; the resolver's cache makes
/// interleaved energies cheap.
///
/// A single frame failing to integrate is recorded in the report and
/// skipped. Missing metadata or an unresolvable energy aborts the run, as
/// does a duplicate coordinate tuple (see [`StackAssemblyError`]).
pub fn integrate_stack<I>(
    frames: I,
    index: &CoordinateIndex,
    resolver: &mut HandleResolver,
) -> Result<StackOutput, StackError>
where
    I: IntoIterator<Item = Frame>,
{
    run_stack(frames, index, resolver, None, |_| {})
}

/// Core streaming loop with cancellation and progress hooks.
pub(crate) fn run_stack<I, P>(
    frames: I,
    index: &CoordinateIndex,
    resolver: &mut HandleResolver,
    cancelled: Option<&AtomicBool>,
    mut progress: P,
) -> Result<StackOutput, StackError>
where
    I: IntoIterator<Item = Frame>,
    P: FnMut(usize),
{
    let mut container = OutputContainer::new(index.dims().to_vec());
    let mut report = StackReport::default();

    for (frame_index, mut frame) in frames.into_iter().enumerate() {
        if let Some(flag) = cancelled {
            if flag.load(Ordering::SeqCst) {
                report.cancelled = true;
                break;
            }
        }

        index.apply_mappings(&mut frame.metadata);

        let tuple = index
            .tuple_for(frame_index, &frame.metadata)
            .map_err(|e| StackError::Resolve {
                frame: frame_index,
                source: ResolveError::Configuration(e),
            })?;

        let handle = resolver
            .resolve_for(frame_index, &frame.metadata)
            .map_err(|source| StackError::Resolve {
                frame: frame_index,
                source,
            })?;

        match integrate(&handle, &frame) {
            Ok(result) => match container.insert(tuple, result) {
                Ok(()) => report.integrated += 1,
                Err(duplicate) => {
                    // Neither frame at this coordinate can be preferred.
                    container.remove(&duplicate);
                    container.finalize();
                    return Err(StackError::Assembly(StackAssemblyError {
                        duplicate,
                        frame: frame_index,
                        partial: StackOutput { container, report },
                    }));
                }
            },
            Err(error) => {
                log::warn!("skipping frame {} at {}: {}", frame_index, tuple, error);
                report.skipped.push(SkippedFrame {
                    index: frame_index,
                    coordinate: tuple,
                    error,
                });
            }
        }

        // Raw pixels released here, before the next frame is pulled.
        drop(frame);
        progress(report.integrated + report.skipped.len());
    }

    container.finalize();
    Ok(StackOutput { container, report })
}
