mod volume;

use std::sync::Arc;
use std::time::Duration;

use crate::connection::DeviceLink;
use crate::testing::MockLink;

const TIMEOUT: Duration = Duration::from_secs(5);

fn as_dyn(link: &Arc<MockLink>) -> Arc<dyn DeviceLink> {
    link.clone()
}
