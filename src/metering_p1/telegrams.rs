//! Known-good telegrams as sent by real meters.
//! Usable as fake input when no meter is connected.

/// DSMR 2.2, 9600 7E1, no checksum, gas value on a continuation line
pub const V22: &str = concat!(
    "/XMX5XMXABCE000063181\r\n",
    "\r\n",
    "0-0:96.1.1(31333634303033302020202020202020)\r\n",
    "1-0:1.8.1(32586.251*kWh)\r\n",
    "1-0:1.8.2(36388.384*kWh)\r\n",
    "1-0:2.8.1(00000.111*kWh)\r\n",
    "1-0:2.8.2(00000.286*kWh)\r\n",
    "0-0:96.14.0(0001)\r\n",
    "1-0:1.7.0(0005.01*kW)\r\n",
    "1-0:2.7.0(0000.00*kW)\r\n",
    "0-0:96.13.1()\r\n",
    "0-0:96.13.0()\r\n",
    "0-1:96.1.0(3238303131303038333133313637353133)\r\n",
    "0-1:24.1.0(03)\r\n",
    "0-1:24.3.0(180902110000)(08)(60)(1)(0-1:24.2.0)(m3)\r\n",
    "(12007.760)\r\n",
    "!\r\n",
);

/// DSMR 4.2 single phase with power failure log
pub const V42: &str = concat!(
    "/KFM5KAIFA-METER\r\n",
    "\r\n",
    "1-3:0.2.8(42)\r\n",
    "0-0:1.0.0(161113205757W)\r\n",
    "0-0:96.1.1(4530303033303030303030303030303030)\r\n",
    "1-0:1.8.1(001581.123*kWh)\r\n",
    "1-0:1.8.2(001435.706*kWh)\r\n",
    "1-0:2.8.1(000000.000*kWh)\r\n",
    "1-0:2.8.2(000000.000*kWh)\r\n",
    "0-0:96.14.0(0002)\r\n",
    "1-0:1.7.0(02.027*kW)\r\n",
    "1-0:2.7.0(00.000*kW)\r\n",
    "0-0:96.7.21(00015)\r\n",
    "0-0:96.7.9(00007)\r\n",
    "1-0:99.97.0(2)(0-0:96.7.19)(160324180320W)(0000237126*s)(150101000001W)(0000000301*s)\r\n",
    "1-0:32.32.0(00000)\r\n",
    "1-0:32.36.0(00000)\r\n",
    "0-0:96.13.1()\r\n",
    "0-0:96.13.0()\r\n",
    "1-0:31.7.0(009*A)\r\n",
    "1-0:21.7.0(02.027*kW)\r\n",
    "1-0:22.7.0(00.000*kW)\r\n",
    "0-1:24.1.0(003)\r\n",
    "0-1:96.1.0(4730303139333430333131313938323136)\r\n",
    "0-1:24.2.1(161129200000W)(00981.443*m3)\r\n",
    "!24BF\r\n",
);

/// DSMR 5.0 single phase
pub const V50: &str = concat!(
    "/XMX5LGBBLA4415290514\r\n",
    "\r\n",
    "1-3:0.2.8(50)\r\n",
    "0-0:1.0.0(180901194246S)\r\n",
    "0-0:96.1.1(4530303435303034303134363938333137)\r\n",
    "1-0:1.8.1(001362.372*kWh)\r\n",
    "1-0:1.8.2(000851.129*kWh)\r\n",
    "1-0:2.8.1(000000.000*kWh)\r\n",
    "1-0:2.8.2(000000.000*kWh)\r\n",
    "0-0:96.14.0(0001)\r\n",
    "1-0:1.7.0(00.276*kW)\r\n",
    "1-0:2.7.0(00.000*kW)\r\n",
    "0-0:96.7.21(00002)\r\n",
    "0-0:96.7.9(00000)\r\n",
    "1-0:99.97.0(0)(0-0:96.7.19)\r\n",
    "1-0:32.32.0(00002)\r\n",
    "1-0:32.36.0(00000)\r\n",
    "0-0:96.13.0()\r\n",
    "1-0:32.7.0(230.0*V)\r\n",
    "1-0:31.7.0(002*A)\r\n",
    "1-0:21.7.0(00.276*kW)\r\n",
    "1-0:22.7.0(00.000*kW)\r\n",
    "0-1:24.1.0(003)\r\n",
    "0-1:96.1.0(4730303339303031373637383534313137)\r\n",
    "0-1:24.2.1(180901194004S)(00485.627*m3)\r\n",
    "!22EE\r\n",
);

/// DSMR 5.0 three phase with solar back-feed
pub const V50_L3: &str = concat!(
    "/ISK5\\2M550T-1011\r\n",
    "\r\n",
    "1-3:0.2.8(50)\r\n",
    "0-0:1.0.0(190224131505W)\r\n",
    "0-0:96.1.1(4530303434303037313331353138333138)\r\n",
    "1-0:1.8.1(004233.417*kWh)\r\n",
    "1-0:1.8.2(003719.822*kWh)\r\n",
    "1-0:2.8.1(000912.350*kWh)\r\n",
    "1-0:2.8.2(002245.109*kWh)\r\n",
    "0-0:96.14.0(0002)\r\n",
    "1-0:1.7.0(01.193*kW)\r\n",
    "1-0:2.7.0(00.000*kW)\r\n",
    "0-0:96.7.21(00011)\r\n",
    "0-0:96.7.9(00003)\r\n",
    "1-0:99.97.0(1)(0-0:96.7.19)(180903101246S)(0000004223*s)\r\n",
    "1-0:32.32.0(00004)\r\n",
    "1-0:52.32.0(00003)\r\n",
    "1-0:72.32.0(00003)\r\n",
    "1-0:32.36.0(00000)\r\n",
    "1-0:52.36.0(00000)\r\n",
    "1-0:72.36.0(00000)\r\n",
    "0-0:96.13.0()\r\n",
    "1-0:32.7.0(231.4*V)\r\n",
    "1-0:52.7.0(229.8*V)\r\n",
    "1-0:72.7.0(230.6*V)\r\n",
    "1-0:31.7.0(002*A)\r\n",
    "1-0:51.7.0(001*A)\r\n",
    "1-0:71.7.0(002*A)\r\n",
    "1-0:21.7.0(00.488*kW)\r\n",
    "1-0:41.7.0(00.212*kW)\r\n",
    "1-0:61.7.0(00.493*kW)\r\n",
    "1-0:22.7.0(00.000*kW)\r\n",
    "1-0:42.7.0(00.000*kW)\r\n",
    "1-0:62.7.0(00.000*kW)\r\n",
    "0-1:24.1.0(003)\r\n",
    "0-1:96.1.0(4730303538353330303031313730343139)\r\n",
    "0-1:24.2.1(190224131002W)(03528.302*m3)\r\n",
    "!43DD\r\n",
);

/// Belgian e-MUCS (Fluvius) three phase
pub const BE: &str = concat!(
    "/FLU5\\253769484_A\r\n",
    "\r\n",
    "0-0:96.1.4(50217)\r\n",
    "0-0:96.1.1(3153414733313031303231363035)\r\n",
    "0-0:1.0.0(200512135409S)\r\n",
    "1-0:1.8.1(000000.034*kWh)\r\n",
    "1-0:1.8.2(000015.758*kWh)\r\n",
    "1-0:2.8.1(000000.000*kWh)\r\n",
    "1-0:2.8.2(000000.011*kWh)\r\n",
    "0-0:96.14.0(0001)\r\n",
    "1-0:1.4.0(02.351*kW)\r\n",
    "1-0:1.6.0(200509134558S)(02.589*kW)\r\n",
    "1-0:1.7.0(00.000*kW)\r\n",
    "1-0:2.7.0(00.000*kW)\r\n",
    "1-0:21.7.0(00.000*kW)\r\n",
    "1-0:41.7.0(00.000*kW)\r\n",
    "1-0:61.7.0(00.000*kW)\r\n",
    "1-0:22.7.0(00.000*kW)\r\n",
    "1-0:42.7.0(00.000*kW)\r\n",
    "1-0:62.7.0(00.000*kW)\r\n",
    "1-0:32.7.0(234.7*V)\r\n",
    "1-0:52.7.0(234.7*V)\r\n",
    "1-0:72.7.0(234.7*V)\r\n",
    "1-0:31.7.0(000.00*A)\r\n",
    "1-0:51.7.0(000.00*A)\r\n",
    "1-0:71.7.0(000.00*A)\r\n",
    "0-0:96.3.10(1)\r\n",
    "0-0:17.0.0(999.9*kW)\r\n",
    "1-0:31.4.0(999*A)\r\n",
    "0-0:96.13.0()\r\n",
    "0-1:24.1.0(003)\r\n",
    "0-1:96.1.1(37464C4F32313139303333373333)\r\n",
    "0-1:24.4.0(1)\r\n",
    "0-1:24.2.3(200512134558S)(00112.384*m3)\r\n",
    "!A3AA\r\n",
);

/// Sample telegram by its short name
pub fn by_name(name: &str) -> Option<&'static str> {
    match name.to_lowercase().as_str() {
        "v22" => Some(V22),
        "v42" => Some(V42),
        "v50" => Some(V50),
        "v50l3" => Some(V50_L3),
        "be" => Some(BE),
        _ => None,
    }
}

pub fn all() -> Vec<(&'static str, &'static str)> {
    vec![
        ("v22", V22),
        ("v42", V42),
        ("v50", V50),
        ("v50l3", V50_L3),
        ("be", BE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("v50"), Some(V50));
        assert_eq!(by_name("BE"), Some(BE));
        assert_eq!(by_name("v30"), None);
    }

    #[test]
    fn test_samples_are_crlf_terminated() {
        for (name, telegram) in all() {
            assert!(telegram.starts_with('/'), "{}", name);
            assert!(telegram.ends_with("\r\n"), "{}", name);
            assert!(!telegram.replace("\r\n", "").contains('\n'), "{} has a bare LF", name);
        }
    }
}
