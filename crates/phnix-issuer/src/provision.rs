use crate::error::Result;
use phnix_core::{AuthorityRepository, PhnScheme, PoiCode};

/// Provisions `codes` in order.
///
/// Every code is checked against `scheme` first; one code the checksum
/// cannot fold rejects the whole list and nothing is written.
pub async fn provision_authorities<S: AuthorityRepository>(
    store: &S,
    scheme: &PhnScheme,
    codes: &[String],
) -> Result<Vec<PoiCode>> {
    let mut checked = Vec::with_capacity(codes.len());
    for code in codes {
        let code = PoiCode::new(code.as_str())?;
        scheme.check_prefix(&code)?;
        checked.push(code);
    }

    for code in &checked {
        let created = store.provision(code).await?;
        tracing::info!(poi = %code, created, "authority provisioned");
    }
    Ok(checked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use phnix_storage::InMemoryRepository;

    fn codes(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|code| code.to_string()).collect()
    }

    #[tokio::test]
    async fn codes_outside_the_checksum_alphabet_are_refused() {
        let store = InMemoryRepository::new();
        let scheme = PhnScheme::default();

        let err = provision_authorities(&store, &scheme, &codes(&["1234", "3053"]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "scheme");
        assert!(err.is_fatal());
        assert!(store.get(&PoiCode::new("3053").unwrap()).await.unwrap().is_none());
        assert!(store.next_available(1, 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn valid_codes_are_provisioned_in_order() {
        let store = InMemoryRepository::new();
        let scheme = PhnScheme::default();

        let provisioned = provision_authorities(&store, &scheme, &codes(&["3053", "3054"]))
            .await
            .unwrap();
        let provisioned: Vec<_> = provisioned.iter().map(PoiCode::as_str).collect();
        assert_eq!(provisioned, vec!["3053", "3054"]);

        // provisioning again leaves the existing authorities alone
        provision_authorities(&store, &scheme, &codes(&["3053"]))
            .await
            .unwrap();
        let first = store.next_available(1, 100).await.unwrap().unwrap();
        assert_eq!(first.code.as_str(), "3053");
        assert_eq!(first.issued, 0);
    }
}
