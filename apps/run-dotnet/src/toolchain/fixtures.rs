//! Test fixtures shared by the toolchain and bootstrap tests.

use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha512};

/// Shell script installed as the fake `dotnet` entry point.
pub const FAKE_DOTNET: &str = "#!/bin/sh\necho \"fake dotnet $*\"\n";

/// Builds an SDK-shaped tarball: `./dotnet`, `./LICENSE.txt`, `./sdk/<version>/dotnet.dll`.
pub fn sdk_tarball(sdk_version: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let mut dir = tar::Header::new_gnu();
    dir.set_entry_type(tar::EntryType::Directory);
    dir.set_size(0);
    dir.set_mode(0o755);
    dir.set_cksum();
    builder.append_data(&mut dir, "./", std::io::empty()).unwrap();

    let dll_path = format!("./sdk/{sdk_version}/dotnet.dll");
    let files: [(&str, &[u8], u32); 3] = [
        ("./dotnet", FAKE_DOTNET.as_bytes(), 0o755),
        ("./LICENSE.txt", b"MIT", 0o644),
        (dll_path.as_str(), b"dll", 0o644),
    ];
    for (path, data, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(mode);
        header.set_cksum();
        builder.append_data(&mut header, path, data).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Builds a tarball that lacks the entry point.
pub fn tarball_without_entry_point() -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.set_size(3);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "./README.md", b"hi\n".as_slice())
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

/// Lowercase hex SHA-512 of `bytes`.
pub fn sha512_hex(bytes: &[u8]) -> String {
    hex::encode(Sha512::digest(bytes))
}

/// A release index with an active LTS channel `8.0` and an STS channel `9.0`.
pub fn index_json(base_url: &str) -> String {
    format!(
        r#"{{
            "releases-index": [
                {{ "channel-version": "9.0", "release-type": "sts", "support-phase": "active",
                   "releases.json": "{base_url}/9.0/releases.json" }},
                {{ "channel-version": "8.0", "release-type": "lts", "support-phase": "active",
                   "releases.json": "{base_url}/8.0/releases.json" }}
            ]
        }}"#
    )
}

/// A channel document whose single release offers one SDK tarball for `rid`.
pub fn channel_json(
    base_url: &str,
    release_version: &str,
    rid: &str,
    file_name: &str,
    hash: Option<&str>,
) -> String {
    let hash = hash.map_or_else(String::new, |h| format!(r#", "hash": "{h}""#));
    format!(
        r#"{{
            "latest-release": "{release_version}",
            "releases": [
                {{
                    "release-version": "{release_version}",
                    "sdk": {{ "files": [
                        {{ "name": "dotnet-sdk-{rid}.tar.gz", "rid": "{rid}",
                           "url": "{base_url}/files/{file_name}"{hash} }}
                    ] }},
                    "runtime": {{ "files": [
                        {{ "name": "dotnet-runtime-{rid}.tar.gz", "rid": "{rid}",
                           "url": "{base_url}/files/runtime-{file_name}" }}
                    ] }}
                }}
            ]
        }}"#
    )
}
