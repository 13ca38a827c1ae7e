use super::test_helpers::*;
use super::*;
use crate::error::TransferError;
use crate::types::{ResponseInfo, TaskInfo};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

mod cancel;
mod schedule;

fn ok_task(source: &url::Url) -> TaskInfo {
    TaskInfo::new(source, Some(ResponseInfo { status: 200 }))
}
