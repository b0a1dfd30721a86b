//! Register-level driver for the BQ25703A.
//! Blocking I2C helpers; the async version mirrors this API behind the `async` feature.

use crate::data_types::{AdcChannel, ChargerLimits, ChargerStatus, RawSample};
use crate::error::Error;
use crate::registers::{
    ADC_BLOCK_LEN, ADC_BLOCK_START, AdcOptionBits, ChargeOption0Bits, ChargeStatusBits, DEFAULT_I2C_ADDRESS,
    DEVICE_ID, MANUFACTURER_ID, addr, bits_to_charge_current, bits_to_max_charge_voltage, charge_current_to_bits,
    code_to_iin_ma, code_to_min_system_voltage, iin_ma_to_code, max_charge_voltage_to_bits, min_system_voltage_to_code,
};
use crate::telemetry::Telemetry;

/// ChargeOption0 power-on reset value.
pub const CHARGE_OPTION_0_POR: u16 = 0xE20E;

/// ADC configuration written once at start-up: every measurement channel except CMPIN,
/// continuous conversion, 3.06 V full scale.
pub const ADC_OPTION_RUN: AdcOptionBits = AdcOptionBits::ADC_CONV
    .union(AdcOptionBits::ADC_START)
    .union(AdcOptionBits::ADC_FULLSCALE)
    .union(AdcOptionBits::EN_ADC_VBUS)
    .union(AdcOptionBits::EN_ADC_PSYS)
    .union(AdcOptionBits::EN_ADC_IIN)
    .union(AdcOptionBits::EN_ADC_IDCHG)
    .union(AdcOptionBits::EN_ADC_ICHG)
    .union(AdcOptionBits::EN_ADC_VSYS)
    .union(AdcOptionBits::EN_ADC_VBAT);

/// Apply the start-up changes to a ChargeOption0 value: leave low power mode, move the switching
/// frequency out of the audio band and hold charging inhibited.
pub fn startup_charge_option_0(current: ChargeOption0Bits) -> ChargeOption0Bits {
    let mut bits = current;
    bits.remove(ChargeOption0Bits::EN_LWPWR);
    bits.insert(ChargeOption0Bits::EN_OOA | ChargeOption0Bits::CHRG_INHIBIT);
    bits
}

fn check_identity<E>(manufacturer_id: u8, device_id: u8) -> Result<(), Error<E>> {
    if manufacturer_id == MANUFACTURER_ID && device_id == DEVICE_ID {
        Ok(())
    } else {
        Err(Error::WrongDevice {
            manufacturer_id,
            device_id,
        })
    }
}

/// BQ25703A driver.
pub struct Bq25703a<I2C> {
    i2c: I2C,
    address: u8,
    /// Last ChargeOption0 value written, so enable/inhibit toggles need no read-back.
    charge_option_0: ChargeOption0Bits,
}

impl<I2C> Bq25703a<I2C> {
    /// Create a new driver instance with the default I2C address (0x6B).
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEFAULT_I2C_ADDRESS)
    }

    /// Create a new driver instance with a custom I2C address.
    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            charge_option_0: ChargeOption0Bits::from_bits_retain(CHARGE_OPTION_0_POR),
        }
    }

    /// Return the 7-bit I2C address configured for this instance.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Cached ChargeOption0 value.
    pub fn charge_option_0(&self) -> ChargeOption0Bits {
        self.charge_option_0
    }

    /// Release the bus.
    pub fn free(self) -> I2C {
        self.i2c
    }
}

impl<I2C> Bq25703a<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    /// Verify the device identity, then apply the start-up ChargeOption0 and ADC configuration.
    /// Charging is left inhibited.
    pub fn init(&mut self) -> Result<(), Error<I2C::Error>> {
        let (manufacturer_id, device_id) = self.read_identity()?;
        debug!("identity: manufacturer 0x{:x}, device 0x{:x}", manufacturer_id, device_id);
        check_identity(manufacturer_id, device_id)?;

        let current = ChargeOption0Bits::from_bits_retain(self.read_reg16(addr::CHARGE_OPTION_0)?);
        self.write_charge_option_0(startup_charge_option_0(current))?;
        self.write_reg16(addr::ADC_OPTION, ADC_OPTION_RUN.bits())
    }

    /// Write a single register.
    pub fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(Error::I2c)
    }

    /// Read a single register.
    pub fn read_reg(&mut self, reg: u8) -> Result<u8, Error<I2C::Error>> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(Error::I2c)?;
        Ok(buf[0])
    }

    /// Write a burst starting at a register.
    pub fn write_regs(&mut self, start_reg: u8, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        let mut buf = [0u8; 8];
        if data.len() + 1 > buf.len() {
            return Err(Error::InvalidConfig);
        }
        buf[0] = start_reg;
        buf[1..=data.len()].copy_from_slice(data);
        self.i2c
            .write(self.address, &buf[..=data.len()])
            .map_err(Error::I2c)
    }

    /// Read a burst starting at a register.
    pub fn read_regs(&mut self, start_reg: u8, data: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        self.i2c
            .write_read(self.address, &[start_reg], data)
            .map_err(Error::I2c)
    }

    /// Write a 16-bit register pair (low byte first).
    pub fn write_reg16(&mut self, reg: u8, value: u16) -> Result<(), Error<I2C::Error>> {
        self.write_regs(reg, &value.to_le_bytes())
    }

    /// Read a 16-bit register pair (low byte first).
    pub fn read_reg16(&mut self, reg: u8) -> Result<u16, Error<I2C::Error>> {
        let mut buf = [0u8; 2];
        self.read_regs(reg, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Read manufacturer and device ID in one burst.
    pub fn read_identity(&mut self) -> Result<(u8, u8), Error<I2C::Error>> {
        let mut buf = [0u8; 2];
        self.read_regs(addr::MANUFACTURER_ID, &mut buf)?;
        Ok((buf[0], buf[1]))
    }

    fn write_charge_option_0(&mut self, bits: ChargeOption0Bits) -> Result<(), Error<I2C::Error>> {
        self.write_reg16(addr::CHARGE_OPTION_0, bits.bits())?;
        self.charge_option_0 = bits;
        Ok(())
    }

    /// Set or clear the charge inhibit bit. Writes the cached ChargeOption0 with only that bit changed.
    pub fn set_charge_enable(&mut self, enable: bool) -> Result<(), Error<I2C::Error>> {
        let mut bits = self.charge_option_0;
        bits.set(ChargeOption0Bits::CHRG_INHIBIT, !enable);
        self.write_charge_option_0(bits)
    }

    /// Read one ADC result register.
    pub fn read_adc(&mut self, channel: AdcChannel) -> Result<RawSample, Error<I2C::Error>> {
        let code = self.read_reg(channel.register())?;
        Ok(RawSample { channel, code })
    }

    /// Read the whole ADC result block in one burst and scale it.
    pub fn read_telemetry(&mut self) -> Result<Telemetry, Error<I2C::Error>> {
        let mut block = [0u8; ADC_BLOCK_LEN];
        self.read_regs(ADC_BLOCK_START, &mut block)?;
        Ok(Telemetry::from_adc_block(&block))
    }

    /// Read ChargerStatus raw bits.
    pub fn read_charge_status_raw(&mut self) -> Result<ChargeStatusBits, Error<I2C::Error>> {
        let val = self.read_reg16(addr::CHARGE_STATUS)?;
        Ok(ChargeStatusBits::from_bits_truncate(val))
    }

    /// Decode ChargerStatus.
    pub fn read_charge_status(&mut self) -> Result<ChargerStatus, Error<I2C::Error>> {
        Ok(self.read_charge_status_raw()?.into())
    }

    /// Input current limit the IC is regulating to (IIN_DPM, mA).
    pub fn read_input_current_dpm_ma(&mut self) -> Result<u16, Error<I2C::Error>> {
        Ok(code_to_iin_ma(self.read_reg(addr::IIN_DPM)?))
    }

    /// Set charge current (mA). Values are truncated to the 64 mA grid and saturate at 8128 mA.
    pub fn set_charge_current_ma(&mut self, ma: u16) -> Result<(), Error<I2C::Error>> {
        self.write_reg16(addr::CHARGE_CURRENT, charge_current_to_bits(ma))
    }

    pub fn get_charge_current_ma(&mut self) -> Result<u16, Error<I2C::Error>> {
        Ok(bits_to_charge_current(self.read_reg16(addr::CHARGE_CURRENT)?))
    }

    /// Set charge voltage limit (mV), 16 mV grid.
    pub fn set_max_charge_voltage_mv(&mut self, mv: u16) -> Result<(), Error<I2C::Error>> {
        self.write_reg16(addr::MAX_CHARGE_VOLTAGE, max_charge_voltage_to_bits(mv))
    }

    pub fn get_max_charge_voltage_mv(&mut self) -> Result<u16, Error<I2C::Error>> {
        Ok(bits_to_max_charge_voltage(self.read_reg16(addr::MAX_CHARGE_VOLTAGE)?))
    }

    /// Set minimum system voltage (mV), 256 mV grid.
    pub fn set_min_system_voltage_mv(&mut self, mv: u16) -> Result<(), Error<I2C::Error>> {
        self.write_reg(addr::MIN_SYSTEM_VOLTAGE, min_system_voltage_to_code(mv))
    }

    pub fn get_min_system_voltage_mv(&mut self) -> Result<u16, Error<I2C::Error>> {
        Ok(code_to_min_system_voltage(self.read_reg(addr::MIN_SYSTEM_VOLTAGE)?))
    }

    /// Set the host input current limit (IIN_HOST, mA), 50 mA grid.
    pub fn set_input_current_limit_ma(&mut self, ma: u16) -> Result<(), Error<I2C::Error>> {
        self.write_reg(addr::IIN_HOST, iin_ma_to_code(ma))
    }

    pub fn get_input_current_limit_ma(&mut self) -> Result<u16, Error<I2C::Error>> {
        Ok(code_to_iin_ma(self.read_reg(addr::IIN_HOST)?))
    }

    /// Write all four limit registers.
    pub fn write_limits(&mut self, limits: &ChargerLimits) -> Result<(), Error<I2C::Error>> {
        self.set_charge_current_ma(limits.max_charge_current_ma)?;
        self.set_max_charge_voltage_mv(limits.max_charge_voltage_mv)?;
        self.set_min_system_voltage_mv(limits.min_system_voltage_mv)?;
        self.set_input_current_limit_ma(limits.input_current_limit_ma)
    }
}

#[cfg(feature = "async")]
impl<I2C> Bq25703a<I2C>
where
    I2C: embedded_hal_async::i2c::I2c,
{
    /// Async version of [`Bq25703a::init`].
    pub async fn init_async(&mut self) -> Result<(), Error<I2C::Error>> {
        let (manufacturer_id, device_id) = self.read_identity_async().await?;
        debug!("identity: manufacturer 0x{:x}, device 0x{:x}", manufacturer_id, device_id);
        check_identity(manufacturer_id, device_id)?;

        let current = ChargeOption0Bits::from_bits_retain(self.read_reg16_async(addr::CHARGE_OPTION_0).await?);
        self.write_charge_option_0_async(startup_charge_option_0(current))
            .await?;
        self.write_reg16_async(addr::ADC_OPTION, ADC_OPTION_RUN.bits())
            .await
    }

    pub async fn write_reg_async(&mut self, reg: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        self.i2c
            .write(self.address, &[reg, value])
            .await
            .map_err(Error::I2c)
    }

    pub async fn read_reg_async(&mut self, reg: u8) -> Result<u8, Error<I2C::Error>> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .await
            .map_err(Error::I2c)?;
        Ok(buf[0])
    }

    pub async fn write_regs_async(&mut self, start_reg: u8, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        let mut buf = [0u8; 8];
        if data.len() + 1 > buf.len() {
            return Err(Error::InvalidConfig);
        }
        buf[0] = start_reg;
        buf[1..=data.len()].copy_from_slice(data);
        self.i2c
            .write(self.address, &buf[..=data.len()])
            .await
            .map_err(Error::I2c)
    }

    pub async fn read_regs_async(&mut self, start_reg: u8, data: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        self.i2c
            .write_read(self.address, &[start_reg], data)
            .await
            .map_err(Error::I2c)
    }

    pub async fn write_reg16_async(&mut self, reg: u8, value: u16) -> Result<(), Error<I2C::Error>> {
        self.write_regs_async(reg, &value.to_le_bytes()).await
    }

    pub async fn read_reg16_async(&mut self, reg: u8) -> Result<u16, Error<I2C::Error>> {
        let mut buf = [0u8; 2];
        self.read_regs_async(reg, &mut buf).await?;
        Ok(u16::from_le_bytes(buf))
    }

    pub async fn read_identity_async(&mut self) -> Result<(u8, u8), Error<I2C::Error>> {
        let mut buf = [0u8; 2];
        self.read_regs_async(addr::MANUFACTURER_ID, &mut buf).await?;
        Ok((buf[0], buf[1]))
    }

    async fn write_charge_option_0_async(&mut self, bits: ChargeOption0Bits) -> Result<(), Error<I2C::Error>> {
        self.write_reg16_async(addr::CHARGE_OPTION_0, bits.bits())
            .await?;
        self.charge_option_0 = bits;
        Ok(())
    }

    pub async fn set_charge_enable_async(&mut self, enable: bool) -> Result<(), Error<I2C::Error>> {
        let mut bits = self.charge_option_0;
        bits.set(ChargeOption0Bits::CHRG_INHIBIT, !enable);
        self.write_charge_option_0_async(bits).await
    }

    pub async fn read_adc_async(&mut self, channel: AdcChannel) -> Result<RawSample, Error<I2C::Error>> {
        let code = self.read_reg_async(channel.register()).await?;
        Ok(RawSample { channel, code })
    }

    pub async fn read_telemetry_async(&mut self) -> Result<Telemetry, Error<I2C::Error>> {
        let mut block = [0u8; ADC_BLOCK_LEN];
        self.read_regs_async(ADC_BLOCK_START, &mut block).await?;
        Ok(Telemetry::from_adc_block(&block))
    }

    pub async fn read_charge_status_raw_async(&mut self) -> Result<ChargeStatusBits, Error<I2C::Error>> {
        let val = self.read_reg16_async(addr::CHARGE_STATUS).await?;
        Ok(ChargeStatusBits::from_bits_truncate(val))
    }

    pub async fn read_charge_status_async(&mut self) -> Result<ChargerStatus, Error<I2C::Error>> {
        Ok(self.read_charge_status_raw_async().await?.into())
    }

    pub async fn read_input_current_dpm_ma_async(&mut self) -> Result<u16, Error<I2C::Error>> {
        Ok(code_to_iin_ma(self.read_reg_async(addr::IIN_DPM).await?))
    }

    pub async fn set_charge_current_ma_async(&mut self, ma: u16) -> Result<(), Error<I2C::Error>> {
        self.write_reg16_async(addr::CHARGE_CURRENT, charge_current_to_bits(ma))
            .await
    }

    pub async fn get_charge_current_ma_async(&mut self) -> Result<u16, Error<I2C::Error>> {
        Ok(bits_to_charge_current(self.read_reg16_async(addr::CHARGE_CURRENT).await?))
    }

    pub async fn set_max_charge_voltage_mv_async(&mut self, mv: u16) -> Result<(), Error<I2C::Error>> {
        self.write_reg16_async(addr::MAX_CHARGE_VOLTAGE, max_charge_voltage_to_bits(mv))
            .await
    }

    pub async fn get_max_charge_voltage_mv_async(&mut self) -> Result<u16, Error<I2C::Error>> {
        Ok(bits_to_max_charge_voltage(self.read_reg16_async(addr::MAX_CHARGE_VOLTAGE).await?))
    }

    pub async fn set_min_system_voltage_mv_async(&mut self, mv: u16) -> Result<(), Error<I2C::Error>> {
        self.write_reg_async(addr::MIN_SYSTEM_VOLTAGE, min_system_voltage_to_code(mv))
            .await
    }

    pub async fn get_min_system_voltage_mv_async(&mut self) -> Result<u16, Error<I2C::Error>> {
        Ok(code_to_min_system_voltage(self.read_reg_async(addr::MIN_SYSTEM_VOLTAGE).await?))
    }

    pub async fn set_input_current_limit_ma_async(&mut self, ma: u16) -> Result<(), Error<I2C::Error>> {
        self.write_reg_async(addr::IIN_HOST, iin_ma_to_code(ma)).await
    }

    pub async fn get_input_current_limit_ma_async(&mut self) -> Result<u16, Error<I2C::Error>> {
        Ok(code_to_iin_ma(self.read_reg_async(addr::IIN_HOST).await?))
    }

    pub async fn write_limits_async(&mut self, limits: &ChargerLimits) -> Result<(), Error<I2C::Error>> {
        self.set_charge_current_ma_async(limits.max_charge_current_ma)
            .await?;
        self.set_max_charge_voltage_mv_async(limits.max_charge_voltage_mv)
            .await?;
        self.set_min_system_voltage_mv_async(limits.min_system_voltage_mv)
            .await?;
        self.set_input_current_limit_ma_async(limits.input_current_limit_ma)
            .await
    }
}
