use super::{HUMIDITY, SensorError, SensorReadings, TEMPERATURE};

/// Typed readings from a DHT-family sensor.
/// The driver may hand back NaN for either field when the bus transfer fails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DhtReadings {
    pub temperature_celsius: f32,
    pub humidity_percent: f32,
}

impl SensorReadings<2> for DhtReadings {
    fn to_array(self) -> [f32; 2] {
        let mut values = [0.0; 2];
        values[TEMPERATURE] = self.temperature_celsius;
        values[HUMIDITY] = self.humidity_percent;
        values
    }
}

/// Datasheet measurement range of a DHT part
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DhtLimits {
    pub name: &'static str,
    pub min_celsius: f32,
    pub max_celsius: f32,
    pub min_humidity: f32,
    pub max_humidity: f32,
}

/// AM2302 / DHT22
pub const DHT22: DhtLimits = DhtLimits {
    name: "DHT22",
    min_celsius: -40.0,
    max_celsius: 80.0,
    min_humidity: 0.0,
    max_humidity: 100.0,
};

impl DhtLimits {
    /// Reject NaN and physically impossible values.
    pub fn check(&self, temperature: f32, humidity: f32) -> Result<(), SensorError> {
        self.check_one("temperature", temperature, self.min_celsius, self.max_celsius)?;
        self.check_one("humidity", humidity, self.min_humidity, self.max_humidity)
    }

    fn check_one(
        &self,
        quantity: &'static str,
        value: f32,
        min: f32,
        max: f32,
    ) -> Result<(), SensorError> {
        if value.is_nan() {
            return Err(SensorError::NotANumber {
                sensor: self.name,
                quantity,
            });
        }
        if value < min || value > max {
            return Err(SensorError::OutOfRange {
                sensor: self.name,
                quantity,
                value,
                min,
                max,
            });
        }
        Ok(())
    }
}
