pub mod access;
pub mod column;
pub mod dynamics;
pub mod noise;
pub mod params;
pub mod recorder;
pub mod stimuli;
