//! Standard special-path rules for the supported package types.

use crate::model::{PKG_TYPE_MAVEN, PKG_TYPE_NPM, SpecialPathInfo, Transfer};
use crate::service::SpecialPathClassifier;

const MAVEN_METADATA_FILES: [&str; 2] = ["maven-metadata.xml", "archetype-catalog.xml"];
const CHECKSUM_SUFFIXES: [&str; 4] = [".md5", ".sha1", ".sha256", ".sha512"];
const SIGNATURE_SUFFIX: &str = ".asc";
const NPM_PACKAGE_FILE: &str = "package.json";

/// Classifier covering Maven and npm metadata plus checksum side files.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPathClassifier;

impl StandardPathClassifier {
    fn classify_maven(file_name: &str) -> Option<SpecialPathInfo> {
        let base = CHECKSUM_SUFFIXES
            .iter()
            .find_map(|suffix| file_name.strip_suffix(suffix));
        if MAVEN_METADATA_FILES.contains(&base.unwrap_or(file_name)) {
            return Some(SpecialPathInfo {
                metadata: true,
                decoratable: false,
            });
        }
        if base.is_some() || file_name.ends_with(SIGNATURE_SUFFIX) {
            return Some(SpecialPathInfo {
                metadata: false,
                decoratable: false,
            });
        }
        None
    }

    fn classify_npm(path: &str) -> Option<SpecialPathInfo> {
        let trimmed = path.trim_start_matches('/');
        let segments: Vec<&str> = trimmed.split('/').collect();
        let package_root = match segments.as_slice() {
            [_, file] => *file == NPM_PACKAGE_FILE,
            [scope, _, file] => scope.starts_with('@') && *file == NPM_PACKAGE_FILE,
            _ => false,
        };
        package_root.then_some(SpecialPathInfo {
            metadata: true,
            decoratable: false,
        })
    }
}

impl SpecialPathClassifier for StandardPathClassifier {
    fn classify(&self, transfer: &Transfer, package_type: &str) -> Option<SpecialPathInfo> {
        match package_type {
            PKG_TYPE_MAVEN => Self::classify_maven(transfer.file_name()),
            PKG_TYPE_NPM => Self::classify_npm(transfer.path()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PKG_TYPE_GENERIC_HTTP, StoreKey};

    fn classify(package_type: &str, path: &str) -> Option<SpecialPathInfo> {
        let transfer = Transfer::new(StoreKey::hosted(package_type, "builds"), path);
        StandardPathClassifier.classify(&transfer, package_type)
    }

    #[test]
    fn maven_metadata_and_checksums_are_metadata() {
        for path in [
            "org/foo/maven-metadata.xml",
            "org/foo/maven-metadata.xml.sha1",
            "archetype-catalog.xml",
        ] {
            let info = classify(PKG_TYPE_MAVEN, path);
            assert_eq!(info.map(|info| info.metadata), Some(true), "{path}");
        }
    }

    #[test]
    fn maven_side_files_are_not_decoratable() {
        for path in ["org/foo/1.0/foo-1.0.jar.md5", "org/foo/1.0/foo-1.0.jar.asc"] {
            let info = classify(PKG_TYPE_MAVEN, path);
            assert_eq!(
                info,
                Some(SpecialPathInfo {
                    metadata: false,
                    decoratable: false
                }),
                "{path}"
            );
        }
        assert_eq!(classify(PKG_TYPE_MAVEN, "org/foo/1.0/foo-1.0.jar"), None);
    }

    #[test]
    fn npm_package_root_document_is_metadata() {
        assert!(classify(PKG_TYPE_NPM, "left-pad/package.json").is_some_and(|i| i.metadata));
        assert!(classify(PKG_TYPE_NPM, "@scope/pkg/package.json").is_some_and(|i| i.metadata));
        assert_eq!(classify(PKG_TYPE_NPM, "left-pad/-/left-pad-1.0.0.tgz"), None);
        assert_eq!(classify(PKG_TYPE_NPM, "a/b/c/package.json"), None);
    }

    #[test]
    fn generic_http_has_no_special_paths() {
        assert_eq!(classify(PKG_TYPE_GENERIC_HTTP, "maven-metadata.xml"), None);
    }
}
