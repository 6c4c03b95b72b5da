//! Per-key size probe.

use keyward_core::{Connection, KeyRecord, KeyType, Manager, StoreResult, metrics};
use tracing::warn;

use crate::client::ResilientClient;

/// Why a key produced no record.
enum Skip {
    Missing,
    Unsupported(String),
}

/// Collects type, memory footprint, ttl and element count for single keys.
///
/// Probes are not retried: a key that cannot be inspected is skipped, which
/// is also the normal outcome when it expires between `SCAN` and the probe.
pub struct Inspector<'a, M: Manager> {
    client: &'a ResilientClient<M>,
}

impl<'a, M> Inspector<'a, M>
where
    M: Manager,
    M::Connection: Connection,
{
    /// Inspector using connections from `client`'s pool.
    pub fn new(client: &'a ResilientClient<M>) -> Self {
        Self { client }
    }

    /// Record for `name`, or `None` if the key is gone, has a type keyward
    /// does not model, or any probe failed.
    pub async fn inspect(&self, name: &str) -> Option<KeyRecord> {
        let outcome = match self.client.pool().acquire().await {
            Ok(mut lease) => {
                let result = probe(&mut *lease, name).await;
                lease.track(result)
            }
            Err(error) => Err(error.into()),
        };

        match outcome {
            Ok(Ok(record)) => {
                metrics::record_key_inspected();
                Some(record)
            }
            Ok(Err(Skip::Missing)) => {
                warn!(key = name, "Key disappeared before inspection, skipping");
                metrics::record_key_skipped();
                None
            }
            Ok(Err(Skip::Unsupported(key_type))) => {
                warn!(key = name, key_type = %key_type, "Unsupported key type, skipping");
                metrics::record_key_skipped();
                None
            }
            Err(error) => {
                warn!(key = name, %error, "Failed to inspect key, skipping");
                metrics::record_key_skipped();
                None
            }
        }
    }
}

async fn probe<C: Connection>(
    connection: &mut C,
    name: &str,
) -> StoreResult<Result<KeyRecord, Skip>> {
    let raw_type = connection.key_type(name).await?;
    if raw_type == "none" {
        return Ok(Err(Skip::Missing));
    }
    let Ok(key_type) = raw_type.parse::<KeyType>() else {
        return Ok(Err(Skip::Unsupported(raw_type)));
    };

    let Some(size_bytes) = connection.memory_usage(name).await? else {
        return Ok(Err(Skip::Missing));
    };
    let ttl_seconds = connection.ttl(name).await?;
    let element_count = connection.length(name, key_type).await?;

    Ok(Ok(KeyRecord {
        name: name.to_owned(),
        key_type,
        size_bytes,
        element_count,
        ttl_seconds,
    }))
}
