pub mod identity;
pub mod publish;
pub mod read;
pub mod rotate;
pub mod version;

pub use identity::Identity;
pub use publish::Publish;
pub use read::Read;
pub use rotate::Rotate;
pub use version::Version;
