pub mod flags;

pub use self::flags::MobjFlags;
