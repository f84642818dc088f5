use std::fmt::{self, Display, Formatter};

use crate::hw::FoundDevice;

use super::painter::Painter;
use super::table::Table;

/// Renders a `FoundDevice` as a key-value table.
pub(crate) struct DeviceView<'a> {
    device: &'a FoundDevice,
    painter: &'a Painter,
}

impl<'a> DeviceView<'a> {
    pub(crate) fn new(device: &'a FoundDevice, painter: &'a Painter) -> Self {
        Self { device, painter }
    }
}

impl Display for DeviceView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = self.device.local_name().unwrap_or("<unknown>");
        let rssi = self
            .device
            .rssi()
            .map_or_else(|| "-".to_string(), |rssi| format!("{rssi} dBm"));
        let table = Table::key_value(
            self.painter,
            vec![
                ("adapter", self.painter.value(self.device.adapter_name())),
                ("device_id", self.painter.value(self.device.device_id())),
                ("name", self.painter.value(name)),
                ("rssi", self.painter.value(rssi)),
            ],
        );
        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::all_fields(Some("Hardware_Password_Manager"), Some(-43), "│ rssi      │ -43 dBm")]
    #[case::missing_name(None, Some(-43), "│ name      │ <unknown>")]
    #[case::missing_rssi(Some("Hardware_Password_Manager"), None, "│ rssi      │ -  ")]
    fn device_view_renders_row(
        #[case] name: Option<&str>,
        #[case] rssi: Option<i16>,
        #[case] expected_row: &str,
    ) {
        let device = FoundDevice::new(
            "hci0".into(),
            "AA:BB:CC".into(),
            name.map(String::from),
            rssi,
        );
        let painter = Painter::new(false);

        let rendered = DeviceView::new(&device, &painter).to_string();

        assert!(rendered.contains(expected_row), "{rendered}");
    }
}
