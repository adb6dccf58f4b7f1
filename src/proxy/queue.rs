//! Queue Proxy
//!
//! Typed façade over the queue operations. Item arguments are checked for null
//! (empty payload) before any operation is built; everything else is decided on
//! the partition owner.

use crate::container::listener::{ItemListener, ListenerRegistry};
use crate::error::{ApplicationError, QueueError, Result};
use crate::invocation::invoker::{Interrupt, OperationInvoker};
use crate::operation::ops::{Operation, OperationKind};
use crate::operation::types::{Data, Response};

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const NO_WAIT: i64 = 0;
const WAIT_FOREVER: i64 = -1;

#[derive(Clone)]
pub struct QueueProxy {
    name: String,
    partition_id: u32,
    invoker: OperationInvoker,
    listeners: Arc<ListenerRegistry>,
}

impl QueueProxy {
    pub fn new(name: &str, invoker: OperationInvoker, listeners: Arc<ListenerRegistry>) -> Self {
        let partition_id = invoker.router().partition_id_for(name);
        Self {
            name: name.to_string(),
            partition_id,
            invoker,
            listeners,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    async fn invoke(&self, kind: OperationKind) -> Result<Response> {
        self.invoker
            .invoke(Operation::new(&self.name, kind), self.partition_id)
            .get()
            .await
    }

    async fn invoke_interruptible(
        &self,
        kind: OperationKind,
        interrupt: &Interrupt,
    ) -> Result<Response> {
        self.invoker
            .invoke(Operation::new(&self.name, kind), self.partition_id)
            .get_interruptible(interrupt)
            .await
    }

    // --- Adding ---

    /// Adds `item` if there is room right now.
    pub async fn offer(&self, item: impl Into<Data>) -> Result<bool> {
        self.offer_with(item.into(), NO_WAIT).await
    }

    /// Adds `item`, waiting up to `timeout` on the owner for room.
    pub async fn offer_timeout(&self, item: impl Into<Data>, timeout: Duration) -> Result<bool> {
        self.offer_with(item.into(), timeout_ms(timeout)).await
    }

    /// Adds `item`, waiting as long as it takes for room.
    pub async fn put(&self, item: impl Into<Data>) -> Result<()> {
        self.offer_with(item.into(), WAIT_FOREVER).await?;
        Ok(())
    }

    async fn offer_with(&self, data: Data, timeout_ms: i64) -> Result<bool> {
        check_not_null(&data)?;
        let response = self.invoke(OperationKind::Offer { data, timeout_ms }).await?;
        Ok(response.into_bool()?)
    }

    pub async fn offer_interruptible(
        &self,
        item: impl Into<Data>,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<bool> {
        let data = item.into();
        check_not_null(&data)?;
        let kind = OperationKind::Offer {
            data,
            timeout_ms: timeout_ms(timeout),
        };
        Ok(self.invoke_interruptible(kind, interrupt).await?.into_bool()?)
    }

    /// Adds all items or none; `false` when they do not all fit.
    pub async fn add_all<I, T>(&self, items: I) -> Result<bool>
    where
        I: IntoIterator<Item = T>,
        T: Into<Data>,
    {
        let items = collect_items(items)?;
        Ok(self.invoke(OperationKind::AddAll { items }).await?.into_bool()?)
    }

    // --- Removing ---

    pub async fn poll(&self) -> Result<Option<Data>> {
        self.poll_with(NO_WAIT).await
    }

    pub async fn poll_timeout(&self, timeout: Duration) -> Result<Option<Data>> {
        self.poll_with(timeout_ms(timeout)).await
    }

    /// Removes the head, waiting as long as it takes for one to arrive.
    pub async fn take(&self) -> Result<Data> {
        self.poll_with(WAIT_FOREVER).await?.ok_or_else(|| {
            QueueError::Application(ApplicationError::illegal_state(
                "take completed without an item",
            ))
        })
    }

    async fn poll_with(&self, timeout_ms: i64) -> Result<Option<Data>> {
        let response = self.invoke(OperationKind::Poll { timeout_ms }).await?;
        Ok(response.into_item()?)
    }

    pub async fn poll_interruptible(
        &self,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<Option<Data>> {
        let kind = OperationKind::Poll {
            timeout_ms: timeout_ms(timeout),
        };
        Ok(self.invoke_interruptible(kind, interrupt).await?.into_item()?)
    }

    /// Removes the first occurrence of `item`.
    pub async fn remove(&self, item: impl Into<Data>) -> Result<bool> {
        let data = item.into();
        check_not_null(&data)?;
        Ok(self.invoke(OperationKind::Remove { data }).await?.into_bool()?)
    }

    /// Removes every item equal to one of `items`; `true` if anything went.
    pub async fn remove_all<I, T>(&self, items: I) -> Result<bool>
    where
        I: IntoIterator<Item = T>,
        T: Into<Data>,
    {
        self.compare_and_remove(collect_items(items)?, false).await
    }

    /// Removes every item not equal to one of `items`; `true` if anything went.
    pub async fn retain_all<I, T>(&self, items: I) -> Result<bool>
    where
        I: IntoIterator<Item = T>,
        T: Into<Data>,
    {
        self.compare_and_remove(collect_items(items)?, true).await
    }

    async fn compare_and_remove(&self, items: Vec<Data>, retain: bool) -> Result<bool> {
        let kind = OperationKind::CompareAndRemove { items, retain };
        Ok(self.invoke(kind).await?.into_bool()?)
    }

    pub async fn clear(&self) -> Result<()> {
        self.invoke(OperationKind::Clear).await?;
        Ok(())
    }

    /// Removes up to `max_size` items from the head.
    pub async fn drain(&self, max_size: usize) -> Result<Vec<Data>> {
        let max_size = i32::try_from(max_size).unwrap_or(i32::MAX);
        Ok(self.invoke(OperationKind::Drain { max_size }).await?.into_items()?)
    }

    pub async fn drain_all(&self) -> Result<Vec<Data>> {
        let kind = OperationKind::Drain { max_size: -1 };
        Ok(self.invoke(kind).await?.into_items()?)
    }

    // --- Inspecting ---

    pub async fn peek(&self) -> Result<Option<Data>> {
        Ok(self.invoke(OperationKind::Peek).await?.into_item()?)
    }

    pub async fn size(&self) -> Result<usize> {
        let size = self.invoke(OperationKind::Size).await?.into_int()?;
        Ok(usize::try_from(size).unwrap_or(0))
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.size().await? == 0)
    }

    pub async fn contains(&self, item: impl Into<Data>) -> Result<bool> {
        self.contains_all([item]).await
    }

    pub async fn contains_all<I, T>(&self, items: I) -> Result<bool>
    where
        I: IntoIterator<Item = T>,
        T: Into<Data>,
    {
        let items = collect_items(items)?;
        Ok(self.invoke(OperationKind::Contains { items }).await?.into_bool()?)
    }

    /// Snapshot of the queue in FIFO order.
    pub async fn to_vec(&self) -> Result<Vec<Data>> {
        Ok(self.invoke(OperationKind::Iterator).await?.into_items()?)
    }

    // --- Lifecycle ---

    /// Removes the queue and its contents from the owner and its replicas.
    pub async fn destroy(&self) -> Result<()> {
        self.invoke(OperationKind::Destroy).await?;
        Ok(())
    }

    /// Registers `listener` with this member's listener registry.
    ///
    /// Events are raised by the partition owner and dispatched on the owner's
    /// registry only. Members that do not share a registry (separate processes
    /// over `HttpTransport`) see events only for partitions they own, so register
    /// through the owner when every event matters.
    pub fn add_item_listener(&self, listener: Arc<dyn ItemListener>, include_value: bool) -> Uuid {
        self.listeners.add(&self.name, listener, include_value)
    }

    pub fn remove_item_listener(&self, registration_id: Uuid) -> bool {
        self.listeners.remove(&self.name, registration_id)
    }
}

fn check_not_null(data: &Data) -> Result<()> {
    if data.is_empty() {
        return Err(ApplicationError::null_item().into());
    }
    Ok(())
}

fn collect_items<I, T>(items: I) -> Result<Vec<Data>>
where
    I: IntoIterator<Item = T>,
    T: Into<Data>,
{
    let items: Vec<Data> = items.into_iter().map(Into::into).collect();
    items.iter().try_for_each(check_not_null)?;
    Ok(items)
}

fn timeout_ms(timeout: Duration) -> i64 {
    i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX)
}
