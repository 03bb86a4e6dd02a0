pub mod first_fit_available_power;
pub mod power_delta_fit;
