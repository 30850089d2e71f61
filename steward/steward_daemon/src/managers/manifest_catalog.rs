use std::collections::{BTreeMap, BTreeSet};

use super::manifest::{AppManifest, AutoGenerateRule, ResourceLimits};

const LOWERCASE_ALPHANUMERIC: &str = "abcdefghijklmnopqrstuvwxyz0123456789";
const DOCKWEB_IMAGE: &str = "carbon2029/dockweb:latest";

fn base(name: &str, dashboard: &str, link: &str, image: &str) -> AppManifest {
    AppManifest {
        name: name.to_string(),
        dashboard: dashboard.to_string(),
        link: link.to_string(),
        image: image.to_string(),
        ..Default::default()
    }
}

fn environment(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn required(fields: &[&str]) -> BTreeSet<String> {
    fields
        .iter()
        .chain(std::iter::once(&"DEVICE_NAME"))
        .map(|field| field.to_string())
        .collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn limits(cpus: &str, memory_reservation: &str, memory_limit: &str) -> Option<ResourceLimits> {
    Some(ResourceLimits {
        cpus: cpus.to_string(),
        memory_reservation: memory_reservation.to_string(),
        memory_limit: memory_limit.to_string(),
    })
}

fn small() -> Option<ResourceLimits> {
    limits("0.5", "64m", "256m")
}

fn medium() -> Option<ResourceLimits> {
    limits("1.0", "128m", "512m")
}

fn large() -> Option<ResourceLimits> {
    limits("2.0", "256m", "1g")
}

/// Browser extension nodes packaged in the shared dockweb image.
fn dockweb(name: &str, dashboard: &str, link: &str, prefix: &str, state_dir: &str) -> AppManifest {
    let email = format!("{prefix}_EMAIL");
    let password = format!("{prefix}_PASSWORD");
    AppManifest {
        environment: environment(&[
            (&email, &format!("${email}")),
            (&format!("{prefix}_PASS"), &format!("${password}")),
        ]),
        required_fields: required(&[&email, &password]),
        volumes: vec![format!(".data/{state_dir}:/app/chrome_user_data")],
        resource_limits: large(),
        ..base(name, dashboard, link, DOCKWEB_IMAGE)
    }
}

pub fn builtin_manifests() -> BTreeMap<String, AppManifest> {
    let mut manifests = BTreeMap::new();

    manifests.insert(
        String::from("earnapp"),
        AppManifest {
            environment: environment(&[
                ("EARNAPP_UUID", "$EARNAPP_UUID"),
                ("EARNAPP_TERM", "yes"),
            ]),
            required_fields: required(&[]),
            volumes: strings(&[".data/.earnapp:/etc/earnapp"]),
            resource_limits: medium(),
            auto_generate: BTreeMap::from([(
                String::from("EARNAPP_UUID"),
                AutoGenerateRule {
                    length: 32,
                    prefix: String::from("sdk-node-"),
                    charset: String::from(LOWERCASE_ALPHANUMERIC),
                },
            )]),
            node_id_field: Some(String::from("EARNAPP_UUID")),
            instance_volume: Some(String::from(".data/.earnapp")),
            ..base(
                "EARNAPP",
                "https://earnapp.com/dashboard",
                "https://earnapp.com/i/3zulx7k",
                "fazalfarhan01/earnapp:lite",
            )
        },
    );
    manifests.insert(
        String::from("honeygain"),
        AppManifest {
            required_fields: required(&["HONEYGAIN_EMAIL", "HONEYGAIN_PASSWORD"]),
            command: Some(String::from(
                "-tou-accept -email $HONEYGAIN_EMAIL -pass $HONEYGAIN_PASSWORD -device $DEVICE_NAME",
            )),
            resource_limits: medium(),
            ..base(
                "HONEYGAIN",
                "https://dashboard.honeygain.com/",
                "https://r.honeygain.me/MINDL15721",
                "honeygain/honeygain:latest",
            )
        },
    );
    manifests.insert(
        String::from("iproyalpawns"),
        AppManifest {
            required_fields: required(&["IPROYALPAWNS_EMAIL", "IPROYALPAWNS_PASSWORD"]),
            command: Some(String::from(
                "-accept-tos -email=$IPROYALPAWNS_EMAIL -password=$IPROYALPAWNS_PASSWORD \
                 -device-name=$DEVICE_NAME -device-id=id_$DEVICE_NAME",
            )),
            resource_limits: small(),
            ..base(
                "IPROYALPAWNS",
                "https://dashboard.pawns.app/",
                "https://pawns.app?r=MiNe",
                "iproyal/pawns-cli:latest",
            )
        },
    );
    manifests.insert(
        String::from("packetstream"),
        AppManifest {
            environment: environment(&[("CID", "$PACKETSTREAM_CID")]),
            required_fields: required(&["PACKETSTREAM_CID"]),
            resource_limits: medium(),
            ..base(
                "PACKETSTREAM",
                "https://packetstream.io/dashboard",
                "https://packetstream.io/?psr=3zSD",
                "packetstream/psclient:latest",
            )
        },
    );
    manifests.insert(
        String::from("traffmonetizer"),
        AppManifest {
            required_fields: required(&["TRAFFMONETIZER_TOKEN"]),
            command: Some(String::from(
                "start accept status --token $TRAFFMONETIZER_TOKEN --device-name $DEVICE_NAME",
            )),
            resource_limits: small(),
            ..base(
                "TRAFFMONETIZER",
                "https://app.traffmonetizer.com/dashboard",
                "https://traffmonetizer.com/?aff=366499",
                "traffmonetizer/cli_v2:latest",
            )
        },
    );
    manifests.insert(
        String::from("repocket"),
        AppManifest {
            environment: environment(&[
                ("RP_EMAIL", "$REPOCKET_EMAIL"),
                ("RP_API_KEY", "$REPOCKET_APIKEY"),
            ]),
            required_fields: required(&["REPOCKET_EMAIL", "REPOCKET_APIKEY"]),
            resource_limits: medium(),
            ..base(
                "REPOCKET",
                "https://app.repocket.co/#home",
                "https://link.repocket.co/hr8i",
                "repocket/repocket:latest",
            )
        },
    );
    manifests.insert(
        String::from("earnfm"),
        AppManifest {
            environment: environment(&[("EARNFM_TOKEN", "$EARNFM_APIKEY")]),
            required_fields: required(&["EARNFM_APIKEY"]),
            resource_limits: medium(),
            ..base(
                "EARNFM",
                "https://app.earn.fm/",
                "https://earn.fm/ref/MATTTAV6",
                "earnfm/earnfm-client:latest",
            )
        },
    );
    manifests.insert(
        String::from("proxyrack"),
        AppManifest {
            environment: environment(&[
                ("API_KEY", "$PROXYRACK_APIKEY"),
                ("DEVICE_NAME", "$DEVICE_NAME"),
                ("UUID", "$PROXYRACK_UUID"),
            ]),
            required_fields: required(&["PROXYRACK_APIKEY", "PROXYRACK_UUID"]),
            resource_limits: large(),
            ..base(
                "PROXYRACK",
                "https://peer.proxyrack.com/dashboard",
                "https://peer.proxyrack.com/ref/myoas6qttvhuvkzh8ffx90ns1ouhwgilfgamo5ex",
                "proxyrack/pop:latest",
            )
        },
    );
    manifests.insert(
        String::from("proxylite"),
        AppManifest {
            environment: environment(&[("USER_ID", "$PROXYLITE_USERID")]),
            required_fields: required(&["PROXYLITE_USERID"]),
            resource_limits: large(),
            ..base(
                "PROXYLITE",
                "https://proxylite.ru/",
                "https://proxylite.ru/?r=PJTKXWN3",
                "proxylite/proxyservice:latest",
            )
        },
    );
    manifests.insert(
        String::from("bitping"),
        AppManifest {
            environment: environment(&[
                ("BITPING_EMAIL", "$BITPING_EMAIL"),
                ("BITPING_PASSWORD", "$BITPING_PASSWORD"),
            ]),
            required_fields: required(&["BITPING_EMAIL", "BITPING_PASSWORD"]),
            volumes: strings(&[".data/.bitpingd:/root/.bitpingd"]),
            resource_limits: large(),
            ..base(
                "BITPING",
                "https://app.bitping.com/earnings",
                "https://app.bitping.com?r=qm7mIuX3",
                "bitping/bitpingd:latest",
            )
        },
    );
    manifests.insert(
        String::from("packetshare"),
        AppManifest {
            environment: environment(&[
                ("PACKETSHARE_EMAIL", "$PACKETSHARE_EMAIL"),
                ("PACKETSHARE_PASSWORD", "$PACKETSHARE_PASSWORD"),
            ]),
            required_fields: required(&["PACKETSHARE_EMAIL", "PACKETSHARE_PASSWORD"]),
            command: Some(String::from(
                "-accept-tos -email=$PACKETSHARE_EMAIL -password=$PACKETSHARE_PASSWORD",
            )),
            resource_limits: medium(),
            ..base(
                "PACKETSHARE",
                "https://packetshare.io/ucenter.html",
                "https://www.packetshare.io/?code=A260871CFD822E35",
                "packetshare/packetshare:latest",
            )
        },
    );
    manifests.insert(
        String::from("grass"),
        AppManifest {
            environment: environment(&[
                ("USER_EMAIL", "$GRASS_EMAIL"),
                ("USER_PASSWORD", "$GRASS_PASSWORD"),
            ]),
            required_fields: required(&["GRASS_EMAIL", "GRASS_PASSWORD"]),
            volumes: strings(&[".data/.grass:/app/chrome_user_data"]),
            resource_limits: large(),
            ..base(
                "GRASS",
                "https://app.getgrass.io/dashboard",
                "https://app.getgrass.io/register/?referralCode=qyvJmxgNUhcLo2f",
                "mrcolorrain/grass-node:latest",
            )
        },
    );
    manifests.insert(
        String::from("gradient"),
        dockweb(
            "GRADIENT",
            "https://app.gradient.network/dashboard",
            "https://app.gradient.network/signup?code=9WOBKP",
            "GRADIENT",
            ".gradient",
        ),
    );
    manifests.insert(
        String::from("dawn"),
        AppManifest {
            ports: strings(&["${DAWN_PORT}:5000"]),
            ..dockweb(
                "DAWN",
                "https://dawninternet.com",
                "https://dawninternet.com?code=xo23vynw",
                "DAWN",
                ".dawn",
            )
        },
    );
    manifests.insert(
        String::from("teneo"),
        dockweb(
            "TENEO",
            "https://dashboard.teneo.pro/",
            "https://dashboard.teneo.pro/?code=qPgLn",
            "TENEO",
            ".teneo",
        ),
    );
    manifests.insert(
        String::from("proxybase"),
        AppManifest {
            environment: environment(&[
                ("USER_ID", "$PROXYBASE_USERID"),
                ("DEVICE_NAME", "$DEVICE_NAME"),
            ]),
            required_fields: required(&["PROXYBASE_USERID"]),
            resource_limits: large(),
            ..base(
                "PROXYBASE",
                "https://dash.proxybase.org/",
                "http://dash.proxybase.org/signup?ref=XfOz3zeURm",
                "proxybase/proxybase:latest",
            )
        },
    );
    manifests.insert(
        String::from("wipter"),
        AppManifest {
            environment: environment(&[
                ("WIPTER_EMAIL", "$WIPTER_EMAIL"),
                ("WIPTER_PASSWORD", "$WIPTER_PASSWORD"),
            ]),
            required_fields: required(&["WIPTER_EMAIL", "WIPTER_PASSWORD"]),
            ports: strings(&["${WIPTER_PORT_1}:5900", "${WIPTER_PORT_2}:6080"]),
            resource_limits: medium(),
            ..base(
                "WIPTER",
                "https://wipter.com/dashboard",
                "https://wipter.com/signup?ref=money4band",
                "ghcr.io/techroy23/docker-wipter:latest",
            )
        },
    );
    manifests.insert(
        String::from("mystnode"),
        AppManifest {
            required_fields: required(&[]),
            command: Some(String::from("service --agreed-terms-and-conditions")),
            volumes: strings(&[".data/mysterium-node:/var/lib/mysterium-node"]),
            ports: strings(&["${MYSTNODE_PORT}:4449"]),
            resource_limits: limits("4.0", "512m", "2g"),
            ..base(
                "MYSTNODE",
                "https://mystnodes.com/nodes",
                "https://mystnodes.co/?referral_code=Tc7RaS7Fm12K3Xun6mlU9q9hbnjojjl9aRBW8ZA9",
                "mysteriumnetwork/myst:latest",
            )
        },
    );

    manifests
}
