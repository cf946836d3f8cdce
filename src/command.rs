//! Issues client certificates for database users against a cluster CA
//! kept in a [`SecretStore`].

use bon::Builder;
use tracing::{debug, info};

use crate::bundle::{Bundle, ObjectKey, ToBundle};
use crate::ca::parse_ca;
use crate::error::Result;
use crate::issuer::{CertificateRole, IssueOptions};
use crate::store::SecretStore;

/// Suffix appended to a cluster name to find its CA secret.
pub const CA_SECRET_SUFFIX: &str = "-ca";

/// What to issue and where to put it.
///
/// # Fields
/// * `name` - Name of the secret to create.
/// * `namespace` - Namespace of both the CA secret and the created secret.
/// * `user` - Database user, used as the certificate common name.
/// * `cluster_name` - Cluster whose CA signs the certificate.
#[derive(Debug, Clone, Builder)]
pub struct GenerateParams {
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    pub namespace: String,
    #[builder(into)]
    pub user: String,
    #[builder(into)]
    pub cluster_name: String,
}

impl GenerateParams {
    /// Where the cluster CA is stored.
    pub fn ca_secret(&self) -> ObjectKey {
        ObjectKey::new(
            self.namespace.clone(),
            format!("{}{CA_SECRET_SUFFIX}", self.cluster_name),
        )
    }

    /// Where the issued certificate is stored.
    pub fn user_secret(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// Issues a client certificate for `params.user` and stores it as a TLS bundle.
///
/// The CA is read from `<cluster_name>-ca` in the same namespace. With
/// `dry_run` set nothing is written. The produced bundle is returned either
/// way so the caller can print it.
pub fn generate_user_certificate(
    store: &dyn SecretStore,
    params: &GenerateParams,
    options: &IssueOptions,
    dry_run: bool,
) -> Result<Bundle> {
    let ca_bundle = store.get(&params.ca_secret())?;
    let ca = parse_ca(&ca_bundle)?;

    let user_pair = ca.issue_pair_with(&params.user, CertificateRole::Client, &[], options)?;
    let user_secret = user_pair.to_bundle(params.user_secret());

    if dry_run {
        debug!(secret = %user_secret.identity, "dry run, secret not created");
        return Ok(user_secret);
    }

    store.create(&user_secret)?;
    info!(secret = %user_secret.identity, user = %params.user, "secret created");
    Ok(user_secret)
}
