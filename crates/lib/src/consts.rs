//! Constants shared across the crate.

pub const APP_NAME: &str = "dockbuild";

/// Builder identity of artifacts produced directly by the builder.
pub const BUILDER_ID: &str = "dockbuild.docker";

/// Builder identity of image artifacts, whether committed by the builder or
/// imported from an exported archive.
pub const BUILDER_ID_IMPORT: &str = "dockbuild.post-processor.docker-import";

/// Builder identity of image artifacts re-pointed by the tag post-processor.
pub const BUILDER_ID_TAG: &str = "dockbuild.post-processor.docker-tag";

/// Builder identity of archives written by the save post-processor.
pub const BUILDER_ID_SAVE: &str = "dockbuild.post-processor.docker-save";

/// Reserved artifact state query returning registry image metadata.
pub const REGISTRY_IMAGE_STATE: &str = "dockbuild.registry.image";

/// Region and provider literal identifying the engine family in registry metadata.
pub const ENGINE_FAMILY: &str = "docker";

pub const DEFAULT_EXECUTABLE: &str = "docker";

pub const DEFAULT_CONTAINER_DIR: &str = "/dockbuild-files";
pub const DEFAULT_WINDOWS_CONTAINER_DIR: &str = "c:/dockbuild-files";

/// Template variable substituted with the image reference in `run_command`.
pub const IMAGE_TEMPLATE_VAR: &str = ".Image";

pub const DEFAULT_RUN_COMMAND: [&str; 6] = ["-d", "-i", "-t", "--entrypoint=/bin/sh", "--", "{{.Image}}"];
pub const DEFAULT_WINDOWS_RUN_COMMAND: [&str; 6] = ["-d", "-i", "-t", "--entrypoint=powershell", "--", "{{.Image}}"];

pub const ECR_PUBLIC_HOST: &str = "public.ecr.aws";

/// ECR Public only issues tokens from this region.
pub const ECR_PUBLIC_API_REGION: &str = "us-east-1";

/// Generated-data key holding the content hash of the committed image.
pub const KEY_IMAGE_SHA256: &str = "ImageSha256";
/// Generated-data key holding the distribution digest of the source image.
pub const KEY_SOURCE_IMAGE_DIGEST: &str = "SourceImageDigest";
/// Generated-data key holding the content hash of the source image.
pub const KEY_SOURCE_IMAGE_SHA256: &str = "SourceImageSha256";

pub const ERR_IMAGE_SHA256_NOT_FOUND: &str = "ERR_IMAGE_SHA256_NOT_FOUND";
pub const ERR_SOURCE_IMAGE_DIGEST_NOT_FOUND: &str = "ERR_SOURCE_IMAGE_DIGEST_NOT_FOUND";
pub const ERR_SOURCE_IMAGE_SHA256_NOT_FOUND: &str = "ERR_SOURCE_IMAGE_SHA256_NOT_FOUND";
