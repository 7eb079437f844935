mod key_ring_properties;
mod poll_phase;
mod typed_keys;
