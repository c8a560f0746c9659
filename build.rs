fn main() {
    feature_conflicts();

    let version = get_version();
    println!("cargo:rustc-env=VERSION={version}");
    println!("cargo:warning=Feature tagged version: {version}");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=Cargo.toml");
}

fn feature_conflicts() {
    let tls_rustls = std::env::var("CARGO_FEATURE_TLS_RUSTLS").is_ok();
    let tls_native = std::env::var("CARGO_FEATURE_TLS_NATIVE").is_ok();

    if tls_rustls && tls_native {
        panic!(
            "Cannot enable both 'tls-rustls' and 'tls-native' features simultaneously. Choose one."
        );
    }

    // The WhatsApp Cloud API is HTTPS only.
    if !tls_rustls && !tls_native {
        println!("cargo:warning=No TLS backend selected. Outbound requests to HTTPS endpoints will fail, enable either 'tls-rustls' or 'tls-native'!");
    }

    let sentry = std::env::var("CARGO_FEATURE_SENTRY").is_ok();
    if sentry && !tls_rustls && !tls_native {
        panic!("The 'sentry' feature requires at least one TLS backend. Enable either 'tls-rustls' or 'tls-native' feature");
    }
}

/// Package version with enabled optional features appended as build metadata.
fn get_version() -> String {
    let feature_names = [
        ("OPENAPI", "o"),
        ("HTTP_SERVER", "h"),
        ("SENTRY", "s"),
        ("TLS_NATIVE", "tn"),
        ("TLS_RUSTLS", "tr"),
    ];
    let suffixes: Vec<_> = feature_names
        .into_iter()
        .filter(|(feature, _)| std::env::var(format!("CARGO_FEATURE_{feature}")).is_ok())
        .map(|(_, name)| name)
        .collect();

    let version = env!("CARGO_PKG_VERSION");
    if suffixes.is_empty() {
        version.to_string()
    } else {
        format!("{}+{}", version, suffixes.join(""))
    }
}
