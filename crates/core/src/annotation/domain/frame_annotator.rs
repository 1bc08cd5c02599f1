use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Draws detection markers onto a frame in place.
///
/// Regions may extend past the frame edges; implementations clip them.
pub trait FrameAnnotator: Send {
    fn annotate(&self, frame: &mut Frame, regions: &[Region]);
}
