pub mod persistence;
pub mod playback;
pub mod project;

#[cfg(test)]
pub mod test_fixture;
