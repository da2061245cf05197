mod lifecycle_unit;
mod progression_unit;
