use bq25703a_rs::registers::{
    CHARGE_CURRENT_WEIGHTS, MAX_CHARGE_CURRENT_MA, MAX_CHARGE_VOLTAGE_WEIGHTS, MIN_SYSTEM_VOLTAGE_WEIGHTS,
    bits_to_charge_current, bits_to_max_charge_voltage, charge_current_to_bits, code_to_iin_ma,
    code_to_min_system_voltage, iin_ma_to_code, max_charge_voltage_to_bits, min_system_voltage_to_code,
    weighted_max,
};

#[test]
fn charge_voltage_roundtrip_within_step() {
    for mv in 0..=weighted_max(&MAX_CHARGE_VOLTAGE_WEIGHTS) {
        let back = bits_to_max_charge_voltage(max_charge_voltage_to_bits(mv));
        assert!(back <= mv && mv - back < 16, "{mv} -> {back}");
    }
}

#[test]
fn charge_current_roundtrip_within_step() {
    for ma in 0..=weighted_max(&CHARGE_CURRENT_WEIGHTS) {
        let back = bits_to_charge_current(charge_current_to_bits(ma));
        assert!(back <= ma && ma - back < 64, "{ma} -> {back}");
    }
}

#[test]
fn min_system_voltage_roundtrip_within_step() {
    for mv in 0..=weighted_max(&MIN_SYSTEM_VOLTAGE_WEIGHTS) {
        let back = code_to_min_system_voltage(min_system_voltage_to_code(mv));
        assert!(back <= mv && mv - back < 256, "{mv} -> {back}");
    }
}

#[test]
fn input_current_roundtrip_within_half_step() {
    for ma in 0..=6_350u16 {
        let back = code_to_iin_ma(iin_ma_to_code(ma));
        assert!(back.abs_diff(ma) <= 25, "{ma} -> {back}");
    }
}

#[test]
fn charge_voltage_known_encodings() {
    // 4192 = 4096 + 64 + 32 -> bits 12, 6, 5
    assert_eq!(max_charge_voltage_to_bits(4_192), 0x1060);
    // 4200 drops the 8 mV residue
    assert_eq!(bits_to_max_charge_voltage(max_charge_voltage_to_bits(4_200)), 4_192);
}

#[test]
fn charge_voltage_saturates_at_table_sum() {
    let max = weighted_max(&MAX_CHARGE_VOLTAGE_WEIGHTS);
    assert_eq!(max, 32_752);
    assert_eq!(max_charge_voltage_to_bits(u16::MAX), max_charge_voltage_to_bits(max));
    assert_eq!(max_charge_voltage_to_bits(u16::MAX), 0x7FF0);
}

#[test]
fn charge_current_grid_and_ceiling() {
    assert_eq!(weighted_max(&CHARGE_CURRENT_WEIGHTS), MAX_CHARGE_CURRENT_MA);
    assert_eq!(charge_current_to_bits(8_128), 0x1FC0);
    assert_eq!(charge_current_to_bits(2_048), 0x0800);
    assert_eq!(charge_current_to_bits(63), 0);
    assert_eq!(bits_to_charge_current(charge_current_to_bits(1_000)), 960);
    assert_eq!(bits_to_charge_current(charge_current_to_bits(20_000)), MAX_CHARGE_CURRENT_MA);
}

#[test]
fn decode_ignores_bits_outside_field() {
    assert_eq!(bits_to_charge_current(0x003F), 0);
    assert_eq!(bits_to_charge_current(0xE000 | 0x0040), 64);
    assert_eq!(bits_to_max_charge_voltage(0x800F), 0);
}

#[test]
fn min_system_voltage_codes() {
    assert_eq!(min_system_voltage_to_code(3_584), 0x0E);
    assert_eq!(code_to_min_system_voltage(0x0E), 3_584);
    assert_eq!(code_to_min_system_voltage(0xC0), 0);
    let max = weighted_max(&MIN_SYSTEM_VOLTAGE_WEIGHTS);
    assert_eq!(max, 16_128);
    assert_eq!(code_to_min_system_voltage(min_system_voltage_to_code(u16::MAX)), max);
}

#[test]
fn input_current_rounds_to_nearest_step() {
    assert_eq!(iin_ma_to_code(5_000), 100);
    assert_eq!(iin_ma_to_code(263), 5);
    assert_eq!(iin_ma_to_code(275), 6);
    assert_eq!(iin_ma_to_code(24), 0);
    assert_eq!(code_to_iin_ma(100), 5_000);
}

#[test]
fn input_current_clamps_to_field() {
    assert_eq!(iin_ma_to_code(u16::MAX), 0x7F);
    assert_eq!(code_to_iin_ma(0xFF), 6_350);
}
