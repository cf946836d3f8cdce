use clustercert::bundle::{Bundle, ObjectKey, ToBundle};
use clustercert::ca::{CAKeyPair, RootOptions};
use clustercert::cert::params::DistinguishedName;
use clustercert::command::{GenerateParams, generate_user_certificate};
use clustercert::error::CertError;
use clustercert::issuer::{CertificateRole, IssueOptions};
use clustercert::store::MemoryStore;

fn print_bundle(bundle: &Bundle) {
    println!("# secret/{} ({:?})", bundle.identity, bundle.kind);
    for (field, value) in &bundle.data {
        println!("{field}:\n{}", String::from_utf8_lossy(value));
    }
}

fn main() -> Result<(), CertError> {
    let namespace = "db";
    let cluster_name = "cluster-example";

    // The cluster CA, as the operator would have stored it.
    let subject = DistinguishedName::builder()
        .common_name(cluster_name.to_string())
        .organization("Example Corp".to_string())
        .build();
    let ca = CAKeyPair::create_root(subject, &RootOptions::default())?;
    let store = MemoryStore::new();
    store.insert(ca.to_bundle(ObjectKey::new(namespace, format!("{cluster_name}-ca"))));

    // A server certificate for the read-write service.
    let server = ca.issue_pair(
        &format!("{cluster_name}-rw"),
        CertificateRole::Server,
        &[format!("{cluster_name}-rw.{namespace}.svc")],
    )?;
    print_bundle(&server.to_bundle(ObjectKey::new(namespace, format!("{cluster_name}-server"))));

    // A client certificate for a database user, first as a dry run.
    let params = GenerateParams::builder()
        .name("alice-cert")
        .namespace(namespace)
        .user("alice")
        .cluster_name(cluster_name)
        .build();
    let options = IssueOptions::builder()
        .validity(time::Duration::days(30))
        .build();

    let preview = generate_user_certificate(&store, &params, &options, true)?;
    print_bundle(&preview);

    let created = generate_user_certificate(&store, &params, &options, false)?;
    println!("secret/{} created", created.identity.name);

    Ok(())
}
