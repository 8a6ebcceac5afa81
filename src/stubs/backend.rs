use std::time::Duration;

use crate::core::traits::backend::{
    Backend, BackendFault, BackendOutput, CompilerParameters, SourceInput,
};

/// Backend that answers every compile with the same canned result after a
/// fixed delay.
#[derive(Debug, Clone)]
pub struct BackendStub {
    result: Result<BackendOutput, BackendFault>,
    delay: Duration,
}

impl BackendStub {
    pub fn new(result: Result<BackendOutput, BackendFault>, delay: Duration) -> Self {
        Self { result, delay }
    }
}

#[async_trait::async_trait]
impl Backend for BackendStub {
    #[tracing::instrument]
    async fn compile(
        &self,
        params: &CompilerParameters,
        source: &SourceInput,
    ) -> Result<BackendOutput, BackendFault> {
        tracing::debug!(
            "Start compilation: params={:?}, source={:?}",
            params,
            source
        );
        tokio::time::sleep(self.delay).await;
        tracing::debug!("Compilation result: {:?}", self.result);

        self.result.clone()
    }
}
