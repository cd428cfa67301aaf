mod helpers;
mod race;
mod registry;
