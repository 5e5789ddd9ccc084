use async_trait::async_trait;

use crate::build::runner::{BuildContext, Step};
use crate::build::types::{BuildError, BuildState};

/// Binds every generated-data key to its sentinel so templates always resolve.
#[derive(Debug, Default)]
pub struct StepDefaultGeneratedData;

#[async_trait]
impl Step for StepDefaultGeneratedData {
  fn name(&self) -> &'static str {
    "default-generated-data"
  }

  async fn run(&mut self, _ctx: &BuildContext<'_>, state: &mut BuildState) -> Result<(), BuildError> {
    state.generated_data.seed();
    Ok(())
  }
}
