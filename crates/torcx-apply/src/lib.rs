mod apply;
mod config;
mod fs_utils;
mod layout;
mod loop_device;
mod mounts;
mod propagate;
mod seal;
mod unpack;

pub use apply::{
    apply_and_seal, apply_and_seal_with, apply_images, apply_profile, apply_profile_with,
    setup_paths, ApplyOutcome,
};
pub use config::{TorcxConfig, DEFAULT_CONFIG_PATH, DEFAULT_USR_MOUNTPOINT};
pub use layout::{
    ApplyConfig, SystemDirs, DEFAULT_BASE_DIR, DEFAULT_CONF_DIR, DEFAULT_RUN_DIR,
    DEFAULT_UNPACK_SIZE, DEFAULT_UPPER_PROFILE, OEM_DIR, SEAL_PATH, VENDOR_DIR,
};
pub use loop_device::LoopDevice;
pub use mounts::{KernelMounter, Mounter};
pub use propagate::{propagate_category, retrieve_assets, AssetCategory, AssetManifest};
pub use seal::{
    read_seal_record, seal_system_state, write_run_profile, SealRecord, SEAL_BINDIR,
    SEAL_LOWER_PROFILES, SEAL_RUN_PROFILE_PATH, SEAL_UNPACKDIR, SEAL_UPPER_PROFILE,
};
pub use unpack::{unpack_tgz, ExtractOptions, ImageUnpacker};
