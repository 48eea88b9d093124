//! Clear command implementation

use crate::error::Result;
use crate::store::MediaStore;
use tracing::info;

/// Remove every media entry; run history is kept
pub async fn cmd_clear(store: &MediaStore) -> Result<u64> {
    let removed = store.clear_all().await?;
    info!(removed, "Catalog cleared");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{record, setup_test_store};

    #[tokio::test]
    async fn test_clear_removes_entries() {
        let (store, _tmp) = setup_test_store().await;
        store
            .upsert_batch(&[record("ARD", "News", "A"), record("ARD", "News", "B")])
            .await
            .unwrap();

        assert_eq!(cmd_clear(&store).await.unwrap(), 2);
        assert!(store.is_empty().await.unwrap());
        assert_eq!(cmd_clear(&store).await.unwrap(), 0);
    }
}
