pub mod call;
pub mod console;
pub mod destroy;
pub mod instance_spec;
pub mod instantiate;
pub mod list;
pub mod logs;
pub mod migrate;
pub mod pause;
pub mod prep_receive;
pub mod receive;
pub mod resume;
pub mod show;
pub mod suspend;
pub mod unpause;
