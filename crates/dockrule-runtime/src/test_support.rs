//! Shared test doubles.

use async_trait::async_trait;
use dockrule_core::{ContainerControl, ContainerError, ExternalAddress, OutputSink};
use mockall::mock;

mock! {
    pub Container {}

    #[async_trait]
    impl ContainerControl for Container {
        fn describe(&self) -> String;
        async fn attach_output(
            &self,
            stdout: OutputSink,
            stderr: OutputSink,
        ) -> Result<(), ContainerError>;
        async fn full_log(&self) -> Result<String, ContainerError>;
        fn resolve_external_address(
            &self,
            internal_port: u16,
        ) -> Result<ExternalAddress, ContainerError>;
    }
}
