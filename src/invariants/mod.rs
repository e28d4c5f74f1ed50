pub mod checks;
pub mod kill_switch;
