use crate::cli::Config;
use crate::index::{GoListIndex, VersionIndex};
use std::sync::Arc;

pub struct IndexFactory;

impl IndexFactory {
    pub fn create_go_list(config: Config) -> Arc<dyn VersionIndex> {
        Arc::new(GoListIndex::new(config))
    }
}
