use log::info;
use crate::connectivity::Connectivity;
use crate::error::Error;
use crate::exchange::{exchange, Exchanged};
use crate::extrude::extrude;
use crate::hierarchy::AmrHierarchy;
use crate::message::Controller;




/**
 * Adds ghost layers to an AMR hierarchy and fills them: extrusion, then
 * connectivity, then exchange, which also marks the owner of every shared
 * boundary node. Without a controller the filter runs in
 * single-process mode, where every block with a grid is local and the
 * rest are ignored.
 */
pub struct GhostLayerFilter {
    number_of_ghost_layers: usize,
    controller: Option<Controller>,
}

impl Default for GhostLayerFilter {
    fn default() -> Self {
        Self {
            number_of_ghost_layers: 1,
            controller: None,
        }
    }
}




// ============================================================================
impl GhostLayerFilter {


    pub fn new() -> Self {
        Self::default()
    }


    pub fn with_ghost_layers(mut self, number_of_ghost_layers: usize) -> Self {
        assert!(number_of_ghost_layers >= 1, "the number of ghost layers must be at least 1");
        self.number_of_ghost_layers = number_of_ghost_layers;
        self
    }


    pub fn with_controller(mut self, controller: Controller) -> Self {
        self.controller = Some(controller);
        self
    }


    pub fn number_of_ghost_layers(&self) -> usize {
        self.number_of_ghost_layers
    }


    pub fn controller(&self) -> Option<&Controller> {
        self.controller.as_ref()
    }


    pub fn controller_mut(&mut self) -> Option<&mut Controller> {
        self.controller.as_mut()
    }


    /**
     * Return the controller, leaving the filter in single-process mode.
     */
    pub fn take_controller(&mut self) -> Option<Controller> {
        self.controller.take()
    }


    /**
     * Run the filter on an input hierarchy, which is not modified. With a
     * controller, every rank of its group must call this.
     */
    pub fn execute(&mut self, input: &AmrHierarchy) -> Result<Exchanged, Error> {
        let rank = self.controller.as_ref().map(Controller::rank);
        let extruded = extrude(input, self.number_of_ghost_layers, self.controller.as_mut())?;
        let connectivity = Connectivity::compute(&extruded, rank);
        let result = exchange(extruded, &connectivity, self.controller.as_mut())?;

        info!(
            "rank {}: {} ghost layers, {} of {} ghost cells filled, {} shared boundary nodes",
            rank.unwrap_or(0),
            self.number_of_ghost_layers,
            result.report.resolved_local + result.report.resolved_remote,
            result.report.receivers,
            result.ownership.shared_points().len());

        Ok(result)
    }
}
