mod profile;
mod store;

pub use profile::{
    list_profiles, merge_image_layers, merge_profiles, read_profile, PROFILE_FILE_EXTENSION,
};
pub use store::{StoreCache, StoreEntry};
